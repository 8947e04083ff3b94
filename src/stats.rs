use std::fmt;

use crate::block::{HEADER_SIZE, Header};

/// Snapshot of how the heap is being used.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Bytes obtained from the heap provider, headers included.
    pub heap_size: usize,
    pub blocks: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
    /// Payload bytes handed out to callers.
    pub used_bytes: usize,
    /// Payload bytes available for reuse.
    pub free_bytes: usize,
    /// Largest single free payload.
    pub largest_free: usize,
}

impl HeapStats {
    pub(crate) fn collect<I>(blocks: I, heap_size: usize) -> Self
    where
        I: IntoIterator<Item = Header>,
    {
        let mut stats = HeapStats {
            heap_size,
            ..Default::default()
        };

        for header in blocks {
            stats.blocks += 1;

            if header.used {
                stats.used_blocks += 1;
                stats.used_bytes += header.size;
            } else {
                stats.free_blocks += 1;
                stats.free_bytes += header.size;
                stats.largest_free = stats.largest_free.max(header.size);
            }
        }

        stats
    }

    /// Bytes spent on block headers.
    pub fn overhead(&self) -> usize {
        self.blocks * HEADER_SIZE
    }
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "heap {} bytes, {} blocks ({} used / {} free), {} bytes used, {} bytes free (largest {}), {} bytes of headers",
            self.heap_size,
            self.blocks,
            self.used_blocks,
            self.free_blocks,
            self.used_bytes,
            self.free_bytes,
            self.largest_free,
            self.overhead()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_used_and_free_separately() {
        let headers = [
            Header { size: 8, used: true, next: None },
            Header { size: 40, used: false, next: None },
            Header { size: 16, used: false, next: None },
        ];

        let stats = HeapStats::collect(headers, 64 + 3 * HEADER_SIZE);

        assert_eq!(3, stats.blocks);
        assert_eq!(1, stats.used_blocks);
        assert_eq!(2, stats.free_blocks);
        assert_eq!(8, stats.used_bytes);
        assert_eq!(56, stats.free_bytes);
        assert_eq!(40, stats.largest_free);
        assert_eq!(stats.heap_size, stats.used_bytes + stats.free_bytes + stats.overhead());
    }
}
