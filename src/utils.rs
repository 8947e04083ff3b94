//! Size and alignment arithmetic shared by the block and heap code.

use std::mem;

/// Size of a machine word. Every block size is a multiple of this.
pub const WORD: usize = mem::size_of::<usize>();

/// Rounds `to_be_aligned` up to the next multiple of `alignment`.
///
/// This is used to align payload sizes to the computer's word size and the
/// committed part of a [`crate::kernel::SystemHeap`] to the page size.
/// `alignment` has to be a power of two.
pub fn align(to_be_aligned: usize, alignment: usize) -> usize {
    (to_be_aligned + alignment - 1) & !(alignment - 1)
}

/// Shorthand for [`align`] to the machine word.
#[inline]
pub fn align_word(size: usize) -> usize {
    align(size, WORD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_sizes_round_up_to_the_next_word() {
        for words in 1..=4 {
            let upper = words * WORD;

            for size in upper - WORD + 1..=upper {
                assert_eq!(upper, align_word(size), "size {size}");
            }
        }
    }

    #[test]
    fn multiples_are_left_alone() {
        for alignment in [WORD, 64, 4096] {
            assert_eq!(3 * alignment, align(3 * alignment, alignment));
            assert_eq!(4 * alignment, align(3 * alignment + 1, alignment));
        }
    }

    #[test]
    fn zero_stays_zero() {
        assert_eq!(0, align_word(0));
    }
}
