use crate::utils::WORD;

/// Size of a block header in bytes: one word for the size, one for the
/// `used` flag and one for the link to the next block.
pub const HEADER_SIZE: usize = 3 * WORD;

/// Smallest payload a block may have after a split. A remainder smaller
/// than this could never be handed out on its own.
pub const MIN_PAYLOAD: usize = WORD;

/// Encoding of `next == None` inside the heap.
const NIL: usize = usize::MAX;

/// Handle to a block header, expressed as the byte offset of the header from
/// the start of the heap.
///
/// Blocks are laid out back to back, so the header of the block that follows
/// `b` lives at `b.offset() + HEADER_SIZE + size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRef(usize);

/// Handle to the payload of a block, as returned by
/// [`crate::Allocator::allocate`].
///
/// Payload handles can only be created by the allocator, so a header can
/// always be recovered by a fixed negative offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Payload(usize);

impl BlockRef {
    #[inline]
    pub(crate) const fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// Byte offset of the header from the start of the heap.
    #[inline]
    pub const fn offset(self) -> usize {
        self.0
    }

    /// Payload that belongs to this header.
    #[inline]
    pub const fn payload(self) -> Payload {
        Payload(self.0 + HEADER_SIZE)
    }

    /// Header of the block that starts right after a block of `size` payload
    /// bytes placed at `self`.
    #[inline]
    pub(crate) const fn following(self, size: usize) -> BlockRef {
        BlockRef(self.0 + HEADER_SIZE + size)
    }
}

impl Payload {
    /// Byte offset of the payload from the start of the heap.
    #[inline]
    pub const fn offset(self) -> usize {
        self.0
    }

    /// Header of the block owning this payload.
    #[inline]
    pub const fn header(self) -> BlockRef {
        BlockRef(self.0 - HEADER_SIZE)
    }
}

/// Block metadata. Content is placed right after it.
///
/// ```text
/// +---------------------+ <------+
/// |        size         |        |
/// +---------------------+        |
/// |        used         |        | -> Header (HEADER_SIZE bytes)
/// +---------------------+        |
/// |        next         |        |
/// +---------------------+ <------+ <- Payload
/// |       Content       |        |
/// |         ...         |        | -> `size` addressable bytes
/// |                     |        |
/// +---------------------+ <------+ <- next header
/// ```
///
/// The header is not a Rust value living in the heap: it is encoded word by
/// word into the heap bytes, so the heap stays a plain byte arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Usable payload size in bytes, always a multiple of the word size.
    pub size: usize,
    /// Whether the block is currently handed out to a caller.
    pub used: bool,
    /// Next block in address order, `None` for the tail.
    pub next: Option<BlockRef>,
}

impl Header {
    /// Decodes the header stored at `at`.
    ///
    /// Panics if `at` is outside of `mem`.
    pub(crate) fn read(mem: &[u8], at: BlockRef) -> Self {
        let base = at.offset();
        let next = read_word(mem, base + 2 * WORD);

        Self {
            size: read_word(mem, base),
            used: read_word(mem, base + WORD) != 0,
            next: (next != NIL).then_some(BlockRef(next)),
        }
    }

    /// Encodes this header at `at`.
    pub(crate) fn write(&self, mem: &mut [u8], at: BlockRef) {
        let base = at.offset();

        write_word(mem, base, self.size);
        write_word(mem, base + WORD, self.used as usize);
        write_word(mem, base + 2 * WORD, self.next.map_or(NIL, BlockRef::offset));
    }
}

fn read_word(mem: &[u8], at: usize) -> usize {
    let mut buf = [0u8; WORD];
    buf.copy_from_slice(&mem[at..at + WORD]);
    usize::from_ne_bytes(buf)
}

fn write_word(mem: &mut [u8], at: usize, value: usize) {
    mem[at..at + WORD].copy_from_slice(&value.to_ne_bytes());
}
