use crate::{
    block::{BlockRef, Header},
    strategy::first_fit,
};

/// Index of blocks known to be free, kept in the order they were inserted.
///
/// This only stores references to blocks that live in the chain. A block is
/// inserted when it is released (or carved off as a split remainder) and
/// removed when it is reused or absorbed by a neighbor, so a used block is
/// never listed.
///
/// ```text
///   FreeList: [ C, A, E ]           (release order)
///
///   +---+    +---+    +---+    +---+    +---+
///   | A | -> | B | -> | C | -> | D | -> | E |        (address order)
///   +---+    +---+    +---+    +---+    +---+
///   free     used     free     used     free
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct FreeList {
    items: Vec<BlockRef>,
}

impl FreeList {
    /// Creates a new empty list.
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockRef> + '_ {
        self.items.iter().copied()
    }

    /// Inserts a free `block` at the end of the list.
    pub fn insert_free_block(&mut self, block: BlockRef) {
        self.items.push(block);
    }

    /// Removes `block` from the list. Returns whether it was there.
    pub fn remove_free_block(&mut self, block: BlockRef) -> bool {
        match self.items.iter().position(|item| *item == block) {
            Some(i) => {
                self.items.remove(i);
                true
            }
            None => false,
        }
    }

    /// Finds the first listed block that can hold `size` bytes and takes it
    /// out of the list.
    ///
    /// This is first-fit over the list order, not the address order.
    pub fn take(&mut self, mem: &[u8], size: usize) -> Option<BlockRef> {
        let candidates = self.items.iter().map(|block| (*block, Header::read(mem, *block)));
        let block = first_fit(candidates, size)?;

        self.remove_free_block(block);

        Some(block)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::HEADER_SIZE;

    fn heap(sizes: &[usize]) -> (Vec<u8>, Vec<BlockRef>) {
        let total = sizes.iter().map(|s| HEADER_SIZE + s).sum();
        let mut mem = vec![0u8; total];
        let mut refs = Vec::new();
        let mut at = BlockRef::new(0);

        for size in sizes {
            Header { size: *size, used: false, next: None }.write(&mut mem, at);
            refs.push(at);
            at = at.following(*size);
        }

        (mem, refs)
    }

    #[test]
    fn new_list_is_empty() {
        let list = FreeList::new();

        assert_eq!(0, list.iter().count());
    }

    #[test]
    fn take_follows_insertion_order() {
        let (mem, refs) = heap(&[32, 16, 64]);
        let mut list = FreeList::new();

        list.insert_free_block(refs[2]);
        list.insert_free_block(refs[0]);

        // refs[0] is first in memory but was freed last.
        assert_eq!(Some(refs[2]), list.take(&mem, 16));
        assert_eq!(vec![refs[0]], list.iter().collect::<Vec<_>>());
    }

    #[test]
    fn take_skips_blocks_that_are_too_small() {
        let (mem, refs) = heap(&[8, 16, 32]);
        let mut list = FreeList::new();

        for block in &refs {
            list.insert_free_block(*block);
        }

        assert_eq!(Some(refs[2]), list.take(&mem, 24));
        assert_eq!(None, list.take(&mem, 24));
        assert_eq!(2, list.iter().count());
    }

    #[test]
    fn remove_reports_missing_blocks() {
        let (_, refs) = heap(&[8, 8]);
        let mut list = FreeList::new();
        list.insert_free_block(refs[0]);

        assert!(!list.remove_free_block(refs[1]));
        assert!(list.remove_free_block(refs[0]));
        assert!(list.iter().all(|block| block != refs[0]));
    }
}
