//! A manual heap allocator with interchangeable placement strategies.
//!
//! The heap is a single contiguous region that only grows. Every block in it
//! starts with a header and the headers form an address ordered chain:
//!
//! ```text
//! +--------+---------+--------+----+--------+-------------+
//! | Header | Payload | Header | .. | Header |   Payload   |  <- brk
//! +--------+---------+--------+----+--------+-------------+
//!  ^ heap start                      ^ top
//! ```
//!
//! Freed blocks are reused by the [`SearchMode`] chosen at initialization,
//! oversized blocks are split and a freed block absorbs its right neighbor
//! when that neighbor is free as well.
//!
//! ```rust
//! use fitalloc::{Allocator, ArenaHeap, SearchMode};
//!
//! let mut allocator = Allocator::new(ArenaHeap::new(4096), SearchMode::BestFit);
//!
//! let p = allocator.allocate(13).unwrap();
//! allocator.payload_mut(p)[..5].copy_from_slice(b"hello");
//! assert_eq!(16, allocator.header(allocator.header_of(p)).size);
//!
//! allocator.release(p);
//! assert_eq!(p, allocator.allocate(16).unwrap());
//! ```
//!
//! The allocator is single threaded: callers have to serialize access.
//! Releasing a payload twice, or one obtained before [`Allocator::reset_heap`],
//! is a caller error that is not detected.

mod block;
mod config;
mod error;
mod freelist;
mod heap;
mod kernel;
mod list;
mod merge;
mod segregated;
mod split;
mod stats;
mod strategy;
pub mod utils;

use tracing::{debug, trace, warn};

pub use block::{BlockRef, HEADER_SIZE, Header, MIN_PAYLOAD, Payload};
pub use config::{AllocatorConfig, Backend};
pub use error::{AllocError, Result};
pub use heap::{ArenaHeap, HeapMemory};
pub use kernel::{DEFAULT_RESERVE, SystemHeap};
pub use segregated::{BUCKETS, CLASS_LIMITS, class_of};
pub use stats::HeapStats;
pub use strategy::SearchMode;

use crate::{
    freelist::FreeList,
    list::BlockList,
    segregated::SegregatedList,
    utils::{WORD, align_word},
};

/// Largest request that can be aligned and given a header without overflow.
const MAX_REQUEST: usize = isize::MAX as usize - HEADER_SIZE - WORD;

/// The allocator: a heap provider plus everything needed to track the blocks
/// carved out of it.
pub struct Allocator<H: HeapMemory = SystemHeap> {
    heap: H,
    mode: SearchMode,
    /// Every block, in address order.
    blocks: BlockList,
    /// Free blocks in release order, only fed in [`SearchMode::FreeList`].
    free_list: FreeList,
    /// Free blocks by size class, only fed in [`SearchMode::SegregatedFit`].
    segregated: SegregatedList,
}

impl<H: HeapMemory> Allocator<H> {
    /// Creates an allocator on top of `heap`, discarding whatever the heap
    /// contained.
    pub fn new(heap: H, mode: SearchMode) -> Self {
        let mut allocator = Self {
            heap,
            mode,
            blocks: BlockList::new(),
            free_list: FreeList::new(),
            segregated: SegregatedList::new(),
        };

        allocator.init(mode);
        allocator
    }

    /// Selects the placement strategy and starts over with an empty heap.
    pub fn init(&mut self, mode: SearchMode) {
        debug!("Initializing heap with {} placement", mode);

        self.mode = mode;
        self.reset_heap();
    }

    /// Drops every block and moves the heap break back to where it started.
    ///
    /// Every payload handed out before is invalid afterwards.
    pub fn reset_heap(&mut self) {
        debug!("Resetting heap of {} bytes", self.heap.brk());

        self.heap.reset();
        self.blocks.clear();
        self.free_list.clear();
        self.segregated.clear();
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Allocates `size` bytes, rounded up to the machine word.
    ///
    /// A free block picked by the active strategy is reused when possible,
    /// otherwise the heap grows by exactly one header plus the aligned size.
    pub fn allocate(&mut self, size: usize) -> Result<Payload> {
        if size > MAX_REQUEST {
            return Err(AllocError::OutOfMemory { requested: size });
        }

        let size = align_word(size);

        if let Some(block) = self.find_block(size) {
            self.place(block, size);

            debug!("Reused block at {} for {} bytes", block.offset(), size);

            return Ok(block.payload());
        }

        let block = self.request_from_os(size)?;

        Ok(block.payload())
    }

    /// Gives the block owning `payload` back to the allocator.
    ///
    /// If the block that follows is free, both are merged first. Only the
    /// right neighbor is looked at.
    pub fn release(&mut self, payload: Payload) {
        let block = self.header_of(payload);

        if let Some((neighbor, absorbed)) = merge::coalesce(self.heap.as_mut_slice(), block) {
            self.forget(neighbor, absorbed.size);

            if self.blocks.top() == Some(neighbor) {
                self.blocks.set_top(block);
            }

            if self.blocks.search_start() == Some(neighbor) {
                self.blocks.set_search_start(block);
            }
        }

        let mem = self.heap.as_mut_slice();
        let mut header = Header::read(mem, block);
        header.used = false;
        header.write(mem, block);

        debug!("Released block at {} ({} bytes)", block.offset(), header.size);

        self.index_free(block, header.size);
    }

    /// Header of the block owning `payload`. This is pure arithmetic.
    #[inline]
    pub fn header_of(&self, payload: Payload) -> BlockRef {
        payload.header()
    }

    /// Reads the header of `block`.
    ///
    /// Panics if `block` does not belong to the current heap.
    pub fn header(&self, block: BlockRef) -> Header {
        Header::read(self.heap.as_slice(), block)
    }

    /// The bytes owned by `payload`, as many as its header says.
    pub fn payload(&self, payload: Payload) -> &[u8] {
        let size = self.header(payload.header()).size;
        let start = payload.offset();

        &self.heap.as_slice()[start..start + size]
    }

    pub fn payload_mut(&mut self, payload: Payload) -> &mut [u8] {
        let size = self.header(payload.header()).size;
        let start = payload.offset();

        &mut self.heap.as_mut_slice()[start..start + size]
    }

    /// First block of the chain.
    pub fn heap_start(&self) -> Option<BlockRef> {
        self.blocks.head()
    }

    /// Last block of the chain.
    pub fn top(&self) -> Option<BlockRef> {
        self.blocks.top()
    }

    /// Where the next next-fit search begins.
    pub fn search_start(&self) -> Option<BlockRef> {
        self.blocks.search_start()
    }

    /// Bytes obtained from the heap provider so far.
    pub fn heap_size(&self) -> usize {
        self.heap.brk()
    }

    /// Every block with its header, in address order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockRef, Header)> + '_ {
        self.blocks.iter(self.heap.as_slice())
    }

    /// Blocks currently tracked by the free list or the size classes, in
    /// search order. Empty for the strategies that scan the chain.
    pub fn indexed(&self) -> Vec<BlockRef> {
        match self.mode {
            SearchMode::FreeList => self.free_list.iter().collect(),
            SearchMode::SegregatedFit => (0..BUCKETS)
                .flat_map(|class| self.segregated.bucket(class).iter().copied())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Members of size class `class`, see [`class_of`].
    pub fn bucket(&self, class: usize) -> &[BlockRef] {
        self.segregated.bucket(class)
    }

    /// Renders the chain as `[[size, used], ...]`.
    pub fn layout(&self) -> String {
        let blocks = self
            .blocks()
            .map(|(_, header)| format!("[{}, {}]", header.size, header.used as u8))
            .collect::<Vec<_>>();

        format!("[{}]", blocks.join(", "))
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats::collect(self.blocks().map(|(_, header)| header), self.heap.brk())
    }

    /// Asks the active strategy for a free block of at least `size` bytes.
    fn find_block(&mut self, size: usize) -> Option<BlockRef> {
        let mem = self.heap.as_slice();

        let found = match self.mode {
            SearchMode::FirstFit => strategy::first_fit(self.blocks.iter(mem), size),
            SearchMode::NextFit => {
                let found = strategy::next_fit(&self.blocks, mem, size);

                if let Some(block) = found {
                    self.blocks.set_search_start(block);
                }

                found
            }
            SearchMode::BestFit => strategy::best_fit(self.blocks.iter(mem), size),
            SearchMode::FreeList => self.free_list.take(mem, size),
            SearchMode::SegregatedFit => self.segregated.take(mem, size),
        };

        trace!("{} search for {} bytes found {:?}", self.mode, size, found);

        found
    }

    /// Commits `block` to a caller. This is the only place where a reused
    /// block is marked used, whatever strategy found it.
    fn place(&mut self, block: BlockRef, size: usize) {
        let Some(remainder) = split::split(self.heap.as_mut_slice(), block, size) else {
            return;
        };

        if self.blocks.top() == Some(block) {
            self.blocks.set_top(remainder);
        }

        let remainder_size = self.header(remainder).size;
        self.index_free(remainder, remainder_size);
    }

    /// Grows the heap by a header plus `size` bytes and appends a used block
    /// there.
    fn request_from_os(&mut self, size: usize) -> Result<BlockRef> {
        let requested = HEADER_SIZE + size;

        let Some(offset) = self.heap.grow(requested) else {
            warn!("Heap refused to grow by {} bytes", requested);
            return Err(AllocError::OutOfMemory { requested });
        };

        let block = BlockRef::new(offset);
        let mem = self.heap.as_mut_slice();

        Header {
            size,
            used: true,
            next: None,
        }
        .write(mem, block);

        self.blocks.append(mem, block);

        debug!("Grew heap by {} bytes, new block at {}", requested, offset);

        Ok(block)
    }

    /// Makes a free block visible to the index of the active strategy.
    fn index_free(&mut self, block: BlockRef, size: usize) {
        match self.mode {
            SearchMode::FreeList => self.free_list.insert_free_block(block),
            SearchMode::SegregatedFit => self.segregated.insert(block, size),
            _ => {}
        }
    }

    /// Drops a block that no longer exists on its own from the index of the
    /// active strategy.
    fn forget(&mut self, block: BlockRef, size: usize) {
        match self.mode {
            SearchMode::FreeList => {
                self.free_list.remove_free_block(block);
            }
            SearchMode::SegregatedFit => {
                self.segregated.remove(block, size);
            }
            _ => {}
        }
    }
}

impl Allocator<SystemHeap> {
    /// Builds an allocator over a fresh [`SystemHeap`] as described by
    /// `config`, regardless of its backend.
    pub fn system(config: &AllocatorConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self::new(SystemHeap::reserve(config.reserve)?, config.mode))
    }
}

impl Allocator<ArenaHeap> {
    /// Builds an allocator over an [`ArenaHeap`] bounded by `config.reserve`.
    pub fn arena(config: &AllocatorConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self::new(ArenaHeap::new(config.reserve), config.mode))
    }
}
