use crate::block::{BlockRef, Header};

/// The block directory: an intrusive, address ordered, singly linked chain of
/// every block in the heap.
///
/// The links live inside the block headers themselves (see [`Header::next`]),
/// so this struct only keeps the bounds of the chain plus the cursor used by
/// next-fit.
///
/// ```text
///   head                                   top
///    |                                      |
/// +--v----+    +-------+    +-------+    +--v----+
/// | Block | -> | Block | -> | Block | -> | Block | -> None
/// +-------+    +-------+    +---^---+    +-------+
///                               |
///                          search_start
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockList {
    head: Option<BlockRef>,
    top: Option<BlockRef>,
    search_start: Option<BlockRef>,
}

/// Iterator over `(block, header)` pairs following the `next` links.
pub(crate) struct Iter<'a> {
    mem: &'a [u8],
    current: Option<BlockRef>,
}

impl BlockList {
    pub const fn new() -> Self {
        Self {
            head: None,
            top: None,
            search_start: None,
        }
    }

    #[inline]
    pub fn head(&self) -> Option<BlockRef> {
        self.head
    }

    #[inline]
    pub fn top(&self) -> Option<BlockRef> {
        self.top
    }

    #[inline]
    pub fn search_start(&self) -> Option<BlockRef> {
        self.search_start
    }

    pub fn set_top(&mut self, block: BlockRef) {
        self.top = Some(block);
    }

    pub fn set_search_start(&mut self, block: BlockRef) {
        self.search_start = Some(block);
    }

    /// Links `block`, whose header is already written at the current end of
    /// the heap, as the new tail of the chain.
    pub fn append(&mut self, mem: &mut [u8], block: BlockRef) {
        if let Some(top) = self.top {
            let mut header = Header::read(mem, top);
            header.next = Some(block);
            header.write(mem, top);
        } else {
            self.head = Some(block);
        }

        self.top = Some(block);
    }

    /// Forgets every block. The heap bytes are not touched.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Iterates the whole chain from the head.
    pub fn iter<'a>(&self, mem: &'a [u8]) -> Iter<'a> {
        Iter::starting_at(mem, self.head)
    }
}

impl<'a> Iter<'a> {
    /// Iterates the chain starting at `start` up to the tail.
    pub fn starting_at(mem: &'a [u8], start: Option<BlockRef>) -> Self {
        Self {
            mem,
            current: start,
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = (BlockRef, Header);

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;
        let header = Header::read(self.mem, block);

        self.current = header.next;

        Some((block, header))
    }
}
