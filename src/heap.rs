//! Heap memory providers.
//!
//! The allocator never talks to the operating system directly. It asks a
//! [`HeapMemory`] to move its break forward by an exact number of bytes, the
//! same contract `sbrk(2)` offers, and reads and writes block headers through
//! the byte view the provider exposes.
//!
//! ```text
//!   0                                brk
//!   +-------+---------+-------+------+ - - - - - - - - - +
//!   | Block | Block   | Block | ...  |   not yet grown   |
//!   +-------+---------+-------+------+ - - - - - - - - - +
//!                                    ^
//!                                    grow(n) returns this offset
//! ```

/// A growable, contiguous heap.
pub trait HeapMemory {
    /// Extends the heap by exactly `len` bytes.
    ///
    /// Returns the previous break, i.e. the offset where the new region
    /// starts, or `None` if the heap cannot grow any further.
    fn grow(&mut self, len: usize) -> Option<usize>;

    /// Moves the break back to its initial position, discarding everything.
    fn reset(&mut self);

    /// Current break, which is also the number of usable bytes.
    fn brk(&self) -> usize;

    /// The whole heap, from offset 0 up to the break.
    fn as_slice(&self) -> &[u8];

    /// Mutable view of the whole heap.
    fn as_mut_slice(&mut self) -> &mut [u8];
}

/// Heap backed by an ordinary vector, bounded by `limit` bytes.
///
/// This is what tests use: it is deterministic and running out of memory is
/// just a matter of picking a small `limit`.
#[derive(Debug, Clone)]
pub struct ArenaHeap {
    bytes: Vec<u8>,
    limit: usize,
}

impl ArenaHeap {
    /// Creates an empty arena that will refuse to grow past `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
        }
    }
}

impl HeapMemory for ArenaHeap {
    fn grow(&mut self, len: usize) -> Option<usize> {
        let prev = self.bytes.len();
        let new_brk = prev.checked_add(len)?;

        if new_brk > self.limit {
            return None;
        }

        // Host allocation failures are reported like any other exhausted heap.
        self.bytes.try_reserve(len).ok()?;
        self.bytes.resize(new_brk, 0);

        Some(prev)
    }

    fn reset(&mut self) {
        self.bytes.clear();
    }

    fn brk(&self) -> usize {
        self.bytes.len()
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
