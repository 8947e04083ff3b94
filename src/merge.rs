use tracing::trace;

use crate::block::{BlockRef, HEADER_SIZE, Header};

/// Returns the right neighbor of `block` if it exists and is free.
pub(crate) fn can_coalesce(mem: &[u8], block: BlockRef) -> Option<(BlockRef, Header)> {
    let next = Header::read(mem, block).next?;
    let header = Header::read(mem, next);

    (!header.used).then_some((next, header))
}

/// Tries to merge `block` with the next one on the chain. This can be
/// performed if that next block is free.
///
/// Only the right neighbor is ever absorbed. Returns the absorbed block and
/// its header as it was before the merge, so the caller can drop any
/// reference it still keeps to it.
pub(crate) fn coalesce(mem: &mut [u8], block: BlockRef) -> Option<(BlockRef, Header)> {
    let (neighbor, neighbor_header) = can_coalesce(mem, block)?;
    let mut header = Header::read(mem, block);

    // We need to cover the header and the actual content of the neighbor.
    header.size += HEADER_SIZE + neighbor_header.size;
    header.next = neighbor_header.next;
    header.write(mem, block);

    trace!(
        "Merged block at {} with neighbor at {}, now {} bytes",
        block.offset(),
        neighbor.offset(),
        header.size
    );

    Some((neighbor, neighbor_header))
}
