//! Segregated free blocks.
//!
//! Free blocks are partitioned by size into a fixed number of classes. A
//! request is only ever served from its own class:
//!
//! ```text
//!   class:   <=8    <=16    <=32    <=64    <=128    >128
//!           +-----+-------+-------+-------+--------+------+
//!   bucket: |  0  |   1   |   2   |   3   |   4    |  5   |
//!           +--|--+---|---+---|---+---|---+---|----+--|---+
//!              v      v       v       v       v       v
//!             [..]   [..]    [..]    [..]    [..]    [..]
//! ```

use crate::{
    block::{BlockRef, Header},
    strategy::best_fit,
};

/// Number of size classes.
pub const BUCKETS: usize = 6;

/// Inclusive upper bound of every class but the last, which is unbounded.
pub const CLASS_LIMITS: [usize; BUCKETS - 1] = [8, 16, 32, 64, 128];

/// Returns the size class `size` belongs to.
pub fn class_of(size: usize) -> usize {
    CLASS_LIMITS
        .iter()
        .position(|limit| size <= *limit)
        .unwrap_or(BUCKETS - 1)
}

/// One list of free blocks per size class.
///
/// Each bucket owns its members. Searching a bucket runs best-fit over its
/// members only, the global chain is never consulted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct SegregatedList {
    buckets: [Vec<BlockRef>; BUCKETS],
}

impl SegregatedList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Members of bucket `class`, in insertion order.
    pub fn bucket(&self, class: usize) -> &[BlockRef] {
        &self.buckets[class]
    }

    /// Files a free block of `size` bytes under its size class.
    pub fn insert(&mut self, block: BlockRef, size: usize) {
        self.buckets[class_of(size)].push(block);
    }

    /// Drops `block`, last filed with `size` bytes, from its size class.
    pub fn remove(&mut self, block: BlockRef, size: usize) -> bool {
        let bucket = &mut self.buckets[class_of(size)];

        match bucket.iter().position(|item| *item == block) {
            Some(i) => {
                bucket.remove(i);
                true
            }
            None => false,
        }
    }

    /// Best-fit search for `size` bytes restricted to the class of `size`.
    /// The chosen block leaves the bucket.
    pub fn take(&mut self, mem: &[u8], size: usize) -> Option<BlockRef> {
        let bucket = &mut self.buckets[class_of(size)];

        let candidates = bucket.iter().map(|block| (*block, Header::read(mem, *block)));
        let block = best_fit(candidates, size)?;

        bucket.retain(|item| *item != block);

        Some(block)
    }

    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(Vec::clear);
    }
}
