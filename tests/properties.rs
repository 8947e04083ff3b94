//! Chain invariants under random allocation scripts.

use fitalloc::{Allocator, ArenaHeap, HEADER_SIZE, Payload, SearchMode, utils::WORD};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    /// Releases the live allocation at this index, modulo the live count.
    Release(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..300).prop_map(Op::Allocate),
        2 => any::<usize>().prop_map(Op::Release),
    ]
}

fn mode() -> impl Strategy<Value = SearchMode> {
    prop::sample::select(SearchMode::ALL.to_vec())
}

/// Checks that the chain covers the heap with no gaps or overlaps, that
/// every size is word aligned and that `top` is the tail.
fn check_chain(allocator: &Allocator<ArenaHeap>) -> Result<(), TestCaseError> {
    let mut expected_offset = 0;
    let mut last = None;

    for (block, header) in allocator.blocks() {
        prop_assert_eq!(expected_offset, block.offset());
        prop_assert_eq!(0, header.size % WORD);

        expected_offset += HEADER_SIZE + header.size;
        last = Some(block);
    }

    prop_assert_eq!(allocator.heap_size(), expected_offset);
    prop_assert_eq!(last, allocator.top());

    Ok(())
}

fn check_index(allocator: &Allocator<ArenaHeap>) -> Result<(), TestCaseError> {
    let chain: Vec<_> = allocator.blocks().map(|(block, _)| block).collect();

    for block in allocator.indexed() {
        prop_assert!(chain.contains(&block), "index points outside the chain");
        prop_assert!(!allocator.header(block).used, "index holds a used block");
    }

    Ok(())
}

proptest! {
    #[test]
    fn random_scripts_keep_the_chain_consistent(
        mode in mode(),
        ops in prop::collection::vec(op(), 1..80),
    ) {
        let mut allocator = Allocator::new(ArenaHeap::new(1 << 20), mode);
        let mut live: Vec<(Payload, usize, u8)> = Vec::new();

        for (step, op) in ops.into_iter().enumerate() {
            match op {
                Op::Allocate(size) => {
                    let payload = allocator.allocate(size).unwrap();
                    let header = allocator.header(allocator.header_of(payload));

                    prop_assert!(header.used);
                    prop_assert!(header.size >= size);

                    // Stamp the payload so overlapping blocks would show up.
                    let stamp = step as u8;
                    allocator.payload_mut(payload)[..size].fill(stamp);
                    live.push((payload, size, stamp));
                }
                Op::Release(index) if !live.is_empty() => {
                    let (payload, _, _) = live.swap_remove(index % live.len());
                    allocator.release(payload);

                    prop_assert!(!allocator.header(allocator.header_of(payload)).used);
                }
                Op::Release(_) => {}
            }

            check_chain(&allocator)?;
            check_index(&allocator)?;
        }

        for (payload, size, stamp) in &live {
            prop_assert!(allocator.header(allocator.header_of(*payload)).used);
            prop_assert!(allocator.payload(*payload)[..*size].iter().all(|b| b == stamp));
        }
    }

    #[test]
    fn release_then_same_size_reuses_the_block(
        mode in prop::sample::select(vec![SearchMode::FirstFit, SearchMode::BestFit, SearchMode::FreeList]),
        sizes in prop::collection::vec(1usize..256, 1..10),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut allocator = Allocator::new(ArenaHeap::new(1 << 20), mode);
        let payloads: Vec<_> = sizes.iter().map(|size| allocator.allocate(*size).unwrap()).collect();

        let i = pick.index(payloads.len());
        let heap_size = allocator.heap_size();

        allocator.release(payloads[i]);
        let again = allocator.allocate(sizes[i]).unwrap();

        // The released block is the only free one, so every strategy picks it.
        prop_assert_eq!(heap_size, allocator.heap_size());
        prop_assert_eq!(allocator.header_of(payloads[i]), allocator.header_of(again));
    }
}
