//! Fixed-width section bitmap
//!
//! One bit per page slot of a section, 256 slots in four 64-bit words.
//! The width never changes once a section is registered.

use crate::core::error::{PageAllocError, Result};
use crate::core::header::{BITMAP_SIZE, BITMAP_WORDS, PAGES_PER_SECTION};
use serde::{Deserialize, Serialize};

/// Occupancy bitmap of a single section
///
/// Represents page state with bits:
/// - 0 = free page
/// - 1 = allocated page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionBitmap {
    /// Bitmap words (each word = 64 pages)
    words: [u64; BITMAP_WORDS],
}

impl SectionBitmap {
    /// Create an all-free bitmap
    pub fn new() -> Self {
        SectionBitmap {
            words: [0u64; BITMAP_WORDS],
        }
    }

    pub fn from_words(words: [u64; BITMAP_WORDS]) -> Self {
        SectionBitmap { words }
    }

    pub fn words(&self) -> &[u64; BITMAP_WORDS] {
        &self.words
    }

    /// Check if the page at `index` within the section is allocated
    pub fn is_allocated(&self, index: usize) -> bool {
        debug_assert!(index < PAGES_PER_SECTION);
        (self.words[index / 64] & (1u64 << (index % 64))) != 0
    }

    /// Mark the page at `index` as allocated
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < PAGES_PER_SECTION);
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    /// Mark the page at `index` as free
    ///
    /// Returns whether the bit was previously set.
    pub fn clear(&mut self, index: usize) -> bool {
        let was_set = self.is_allocated(index);
        self.words[index / 64] &= !(1u64 << (index % 64));
        was_set
    }

    /// True if at least one page in the section is free
    pub fn has_space(&self) -> bool {
        self.words.iter().any(|&word| word != u64::MAX)
    }

    pub fn is_full(&self) -> bool {
        !self.has_space()
    }

    /// Lowest free slot in the section
    pub fn first_free(&self) -> Option<usize> {
        for (word_idx, &word) in self.words.iter().enumerate() {
            if word == u64::MAX {
                continue; // All bits set (all allocated)
            }
            return Some(word_idx * 64 + (!word).trailing_zeros() as usize);
        }
        None
    }

    pub fn allocated_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn free_count(&self) -> usize {
        PAGES_PER_SECTION - self.allocated_count()
    }

    /// Encode as the fixed-width value stored in the directory
    pub fn to_bytes(&self) -> [u8; BITMAP_SIZE] {
        let mut bytes = [0u8; BITMAP_SIZE];
        for (chunk, word) in bytes.chunks_exact_mut(8).zip(self.words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != BITMAP_SIZE {
            return Err(PageAllocError::InvalidBitmapWidth {
                expected: BITMAP_SIZE,
                actual: bytes.len(),
            });
        }

        let mut words = [0u64; BITMAP_WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *word = u64::from_le_bytes(buf);
        }
        Ok(SectionBitmap { words })
    }
}
