//! Carving allocations out of oversized free blocks.
//!
//! ```text
//!   before:  +--------+----------------------------------+
//!            | Header |             size                 |
//!            +--------+----------------------------------+
//!
//!   after:   +--------+-----------+--------+-------------+
//!            | Header | requested | Header |  remainder  |
//!            |  used  |           |  free  |             |
//!            +--------+-----------+--------+-------------+
//! ```

use tracing::trace;

use crate::block::{BlockRef, HEADER_SIZE, Header, MIN_PAYLOAD};

/// Tells whether a block of `size` bytes leaves a remainder worth keeping
/// after handing out `requested` bytes. The remainder needs room for its own
/// header plus the smallest payload we are willing to track.
#[inline]
pub(crate) fn can_split(size: usize, requested: usize) -> bool {
    size >= requested && size - requested >= HEADER_SIZE + MIN_PAYLOAD
}

/// Hands `requested` bytes of `block` out, marking it used.
///
/// When the block is large enough the rest becomes a new free block linked
/// right after it, which is returned. Otherwise the whole block is handed out
/// as it is and no remainder is created.
pub(crate) fn split(mem: &mut [u8], block: BlockRef, requested: usize) -> Option<BlockRef> {
    let mut header = Header::read(mem, block);

    if !can_split(header.size, requested) {
        header.used = true;
        header.write(mem, block);

        return None;
    }

    let remainder = block.following(requested);

    Header {
        size: header.size - requested - HEADER_SIZE,
        used: false,
        next: header.next,
    }
    .write(mem, remainder);

    trace!(
        "Split block at {} ({} bytes) into {} + {}",
        block.offset(),
        header.size,
        requested,
        header.size - requested - HEADER_SIZE
    );

    Header {
        size: requested,
        used: true,
        next: Some(remainder),
    }
    .write(mem, block);

    Some(remainder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_block(size: usize, next: Option<BlockRef>) -> Vec<u8> {
        let mut mem = vec![0u8; HEADER_SIZE + size];
        Header { size, used: false, next }.write(&mut mem, BlockRef::new(0));
        mem
    }

    #[test]
    fn remainder_must_hold_a_header_and_a_word() {
        assert!(can_split(64, 16));
        assert!(can_split(16 + HEADER_SIZE + MIN_PAYLOAD, 16));
        assert!(!can_split(16 + HEADER_SIZE, 16));
        assert!(!can_split(16, 16));
        assert!(!can_split(8, 16));
    }

    #[test]
    fn split_links_remainder_into_the_old_successor() {
        let successor = Some(BlockRef::new(4096));
        let mut mem = free_block(64, successor);
        let block = BlockRef::new(0);

        let remainder = split(&mut mem, block, 16).unwrap();

        assert_eq!(HEADER_SIZE + 16, remainder.offset());
        assert_eq!(
            Header { size: 16, used: true, next: Some(remainder) },
            Header::read(&mem, block)
        );
        assert_eq!(
            Header { size: 64 - 16 - HEADER_SIZE, used: false, next: successor },
            Header::read(&mem, remainder)
        );
    }

    #[test]
    fn small_excess_hands_out_the_whole_block() {
        let mut mem = free_block(32, None);
        let block = BlockRef::new(0);

        assert_eq!(None, split(&mut mem, block, 24));
        assert_eq!(
            Header { size: 32, used: true, next: None },
            Header::read(&mem, block)
        );
    }
}
