//! Placement strategies.
//!
//! Every strategy is a plain search: it looks at block headers and returns
//! the block a request should be placed in, or `None` when nothing fits and
//! the heap has to grow. None of them mark anything as used, that is done in
//! a single place by [`crate::Allocator`] once a candidate is chosen.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    block::{BlockRef, Header},
    error::AllocError,
    list::{BlockList, Iter},
};

/// Which algorithm [`crate::Allocator`] uses to find a reusable block.
///
/// The mode is picked once, at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// First free block, in address order, that is large enough.
    #[default]
    FirstFit,
    /// Like first-fit, but resumes from the last successful position and
    /// wraps around.
    NextFit,
    /// Free block that wastes the fewest bytes.
    BestFit,
    /// First-fit over an index of freed blocks, in the order they were freed.
    FreeList,
    /// Best-fit inside the size class of the request.
    SegregatedFit,
}

impl SearchMode {
    pub const ALL: [SearchMode; 5] = [
        SearchMode::FirstFit,
        SearchMode::NextFit,
        SearchMode::BestFit,
        SearchMode::FreeList,
        SearchMode::SegregatedFit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::FirstFit => "first-fit",
            SearchMode::NextFit => "next-fit",
            SearchMode::BestFit => "best-fit",
            SearchMode::FreeList => "free-list",
            SearchMode::SegregatedFit => "segregated-fit",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = AllocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");

        SearchMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| AllocError::UnknownMode(s.to_string()))
    }
}

#[inline]
fn fits(header: &Header, size: usize) -> bool {
    !header.used && header.size >= size
}

/// Returns the first free block of at least `size` bytes.
pub(crate) fn first_fit<I>(blocks: I, size: usize) -> Option<BlockRef>
where
    I: IntoIterator<Item = (BlockRef, Header)>,
{
    blocks
        .into_iter()
        .find(|(_, header)| fits(header, size))
        .map(|(block, _)| block)
}

/// Circular first-fit starting at the list's search cursor.
///
/// The chain is scanned from the cursor to the tail and then from the head
/// up to, but not including, the cursor, so every block is visited at most
/// once. Moving the cursor to the result is left to the caller.
pub(crate) fn next_fit(list: &BlockList, mem: &[u8], size: usize) -> Option<BlockRef> {
    let cursor = list.search_start();

    if let Some(block) = first_fit(Iter::starting_at(mem, cursor), size) {
        return Some(block);
    }

    let wrapped = list
        .iter(mem)
        .take_while(|(block, _)| Some(*block) != cursor);

    first_fit(wrapped, size)
}

/// Returns the free block whose size is closest to `size`.
///
/// An exact fit ends the search right away. Otherwise the earliest block seen
/// wins ties, it is only replaced by a strictly better one.
///
/// `candidates` can be any sequence of blocks: the whole chain, or just the
/// members of a size class.
pub(crate) fn best_fit<I>(candidates: I, size: usize) -> Option<BlockRef>
where
    I: IntoIterator<Item = (BlockRef, Header)>,
{
    let mut best: Option<(BlockRef, usize)> = None;

    for (block, header) in candidates {
        if !fits(&header, size) {
            continue;
        }

        let waste = header.size - size;

        if waste == 0 {
            return Some(block);
        }

        match best {
            Some((_, best_waste)) if best_waste <= waste => {}
            _ => best = Some((block, waste)),
        }
    }

    best.map(|(block, _)| block)
}
