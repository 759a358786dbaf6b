//! Section directory
//!
//! Maps the first page number of every section to its occupancy bitmap.
//! Entries are created once, when the allocator grows a section, and are
//! never deleted, even when the section becomes entirely free.
//!
//! The directory also owns the invariant checks around the host index:
//! - registering a section whose key already exists is `InvalidExistingBuffer`
//! - mutating a section that does not exist is `InvalidNewBuffer`

pub mod cursor;
pub mod store;

pub use cursor::DirectoryCursor;
pub use store::{BTreeSectionStore, SectionStore};

use crate::core::allocator::bitmap::SectionBitmap;
use crate::core::allocator::AllocationReport;
use crate::core::error::{PageAllocError, Result};
use crate::core::header::{BITMAP_SIZE, PAGES_PER_SECTION};
use serde::{Deserialize, Serialize};

/// Directory image format version
const IMAGE_VERSION: u16 = 1;

/// Per-section occupancy, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionUsage {
    pub start: u64,
    pub allocated: usize,
}

#[derive(Serialize, Deserialize)]
struct DirectoryImage {
    version: u16,
    entries: Vec<(u64, Vec<u8>)>,
}

/// Ordered directory of sections for one structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionDirectory<S: SectionStore = BTreeSectionStore> {
    store: S,
}

impl SectionDirectory<BTreeSectionStore> {
    pub fn new() -> Self {
        SectionDirectory {
            store: BTreeSectionStore::new(),
        }
    }

    /// Encode the directory as `(key, bitmap)` pairs with a CRC32 trailer
    pub fn to_image(&self) -> Result<Vec<u8>> {
        let image = DirectoryImage {
            version: IMAGE_VERSION,
            entries: self
                .store
                .iter()
                .map(|(key, bitmap)| (key, bitmap.to_bytes().to_vec()))
                .collect(),
        };

        let mut bytes = bincode::serialize(&image)?;
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        Ok(bytes)
    }

    /// Decode and verify a directory image
    pub fn from_image(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(PageAllocError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for directory image",
            )));
        }

        let (body, trailer) = bytes.split_at(bytes.len() - 4);
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if crc32fast::hash(body) != expected {
            return Err(PageAllocError::ChecksumMismatch);
        }

        let image: DirectoryImage = bincode::deserialize(body)?;
        if image.version != IMAGE_VERSION {
            return Err(PageAllocError::UnsupportedVersion {
                major: image.version,
                minor: 0,
            });
        }

        let mut directory = SectionDirectory::new();
        let mut previous: Option<u64> = None;
        for (key, value) in image.entries {
            if key.checked_add(PAGES_PER_SECTION as u64).is_none() {
                return Err(PageAllocError::InvalidPageNumber(key));
            }
            if value.len() != BITMAP_SIZE {
                return Err(PageAllocError::InvalidBitmapWidth {
                    expected: BITMAP_SIZE,
                    actual: value.len(),
                });
            }
            if let Some(prev) = previous {
                if key < prev.saturating_add(PAGES_PER_SECTION as u64) {
                    return Err(PageAllocError::OverlappingSections {
                        previous: prev,
                        next: key,
                    });
                }
            }
            let bitmap = SectionBitmap::from_bytes(&value)?;
            if !directory.store.insert_new(key, bitmap) {
                return Err(PageAllocError::InvalidExistingBuffer { section: key });
            }
            previous = Some(key);
        }

        Ok(directory)
    }
}

impl<S: SectionStore> SectionDirectory<S> {
    /// Wrap an existing store
    pub fn with_store(store: S) -> Self {
        SectionDirectory { store }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Raw access to the host index, bypassing the directory invariants
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn cursor(&self) -> DirectoryCursor<'_, S> {
        DirectoryCursor::new(&self.store)
    }

    pub fn bitmap(&self, section: u64) -> Option<&SectionBitmap> {
        self.store.get(section)
    }

    /// Start of the section containing `page_number`, if any
    pub fn section_of(&self, page_number: u64) -> Option<u64> {
        let start = match self.store.seek_ge(page_number) {
            Some(key) if key == page_number => key,
            Some(key) => self.store.prev_key(key)?,
            None => self.store.last_key()?,
        };
        let inside = match start.checked_add(PAGES_PER_SECTION as u64) {
            Some(end) => page_number < end,
            None => true,
        };
        inside.then_some(start)
    }

    /// True if `page_number` is inside a section and marked allocated
    pub fn is_allocated(&self, page_number: u64) -> bool {
        self.section_of(page_number)
            .and_then(|start| {
                self.store
                    .get(start)
                    .map(|bitmap| bitmap.is_allocated((page_number - start) as usize))
            })
            .unwrap_or(false)
    }

    /// Register an all-free bitmap for a freshly grown section
    ///
    /// The section must end within the page number space.
    pub fn register_section(&mut self, section: u64) -> Result<()> {
        if section.checked_add(PAGES_PER_SECTION as u64).is_none() {
            return Err(PageAllocError::InvalidPageNumber(section));
        }
        if !self.store.insert_new(section, SectionBitmap::new()) {
            return Err(PageAllocError::InvalidExistingBuffer { section });
        }
        Ok(())
    }

    /// Mutate the bitmap of an existing section in place
    pub fn modify<R>(&mut self, section: u64, f: impl FnOnce(&mut SectionBitmap) -> R) -> Result<R> {
        match self.store.get_mut(section) {
            Some(bitmap) => Ok(f(bitmap)),
            None => Err(PageAllocError::InvalidNewBuffer { section }),
        }
    }

    /// Next section after `current`, wrapping to the first one
    ///
    /// Returns `None` once the walk would land on `start_key` again, i.e.
    /// after a full cyclic pass.
    pub fn next_section_cyclic(&self, current: u64, start_key: u64) -> Option<u64> {
        let next = self
            .store
            .next_key(current)
            .or_else(|| self.store.first_key())?;
        if next == start_key {
            None
        } else {
            Some(next)
        }
    }

    /// Allocated page count of every section, in key order
    pub fn section_usage(&self) -> Vec<SectionUsage> {
        let mut usage = Vec::with_capacity(self.store.len());
        let mut cursor = self.cursor();
        if !cursor.seek_to_first() {
            return usage;
        }
        loop {
            if let Some(start) = cursor.current_key() {
                if let Some(bitmap) = self.store.get(start) {
                    usage.push(SectionUsage {
                        start,
                        allocated: bitmap.allocated_count(),
                    });
                }
            }
            if !cursor.move_next() {
                break;
            }
        }
        usage
    }

    /// Pre-allocated capacity and free pages, sampling only the first section
    ///
    /// The free count is read from the first section in key order, not from
    /// every section, so the report stays O(1) however large the directory is.
    pub fn free_space_report(&self) -> AllocationReport {
        let Some(first) = self.store.first_key() else {
            return AllocationReport::default();
        };

        let free_pages = self
            .store
            .get(first)
            .map(|bitmap| bitmap.free_count() as u64)
            .unwrap_or(0);

        AllocationReport {
            originally_allocated_pages: self.store.len() as u64 * PAGES_PER_SECTION as u64,
            free_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: u64 = PAGES_PER_SECTION as u64;

    fn directory_with(starts: &[u64]) -> SectionDirectory {
        let mut directory = SectionDirectory::new();
        for &start in starts {
            directory.register_section(start).unwrap();
        }
        directory
    }

    #[test]
    fn test_register_rejects_existing() {
        let mut directory = directory_with(&[1]);
        let result = directory.register_section(1);
        assert!(matches!(
            result,
            Err(PageAllocError::InvalidExistingBuffer { section: 1 })
        ));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_modify_rejects_missing() {
        let mut directory = directory_with(&[1]);
        let result = directory.modify(2, |bitmap| bitmap.set(0));
        assert!(matches!(
            result,
            Err(PageAllocError::InvalidNewBuffer { section: 2 })
        ));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_section_of() {
        let directory = directory_with(&[1, 1 + S, 1 + 4 * S]);

        assert_eq!(directory.section_of(0), None);
        assert_eq!(directory.section_of(1), Some(1));
        assert_eq!(directory.section_of(S), Some(1));
        assert_eq!(directory.section_of(1 + S), Some(1 + S));
        assert_eq!(directory.section_of(2 * S), Some(1 + S));
        // Gap between the second and third sections
        assert_eq!(directory.section_of(1 + 2 * S), None);
        assert_eq!(directory.section_of(1 + 5 * S - 1), Some(1 + 4 * S));
        assert_eq!(directory.section_of(1 + 5 * S), None);
    }

    #[test]
    fn test_next_section_cyclic() {
        let directory = directory_with(&[1, 1 + S, 1 + 2 * S]);

        // Starting from the middle section: forward, wrap, then stop
        assert_eq!(directory.next_section_cyclic(1 + S, 1 + S), Some(1 + 2 * S));
        assert_eq!(directory.next_section_cyclic(1 + 2 * S, 1 + S), Some(1));
        assert_eq!(directory.next_section_cyclic(1, 1 + S), None);

        let single = directory_with(&[1]);
        assert_eq!(single.next_section_cyclic(1, 1), None);
    }

    #[test]
    fn test_report_samples_first_section() {
        let mut directory = directory_with(&[1, 1 + S]);
        directory.modify(1, |bitmap| bitmap.set(0)).unwrap();

        let report = directory.free_space_report();
        assert_eq!(report.originally_allocated_pages, 2 * S);
        assert_eq!(report.free_pages, S - 1);
    }

    #[test]
    fn test_empty_report() {
        let directory = SectionDirectory::new();
        assert_eq!(directory.free_space_report(), AllocationReport::default());
    }

    #[test]
    fn test_section_usage() {
        let mut directory = directory_with(&[1, 1 + S]);
        directory
            .modify(1 + S, |bitmap| {
                bitmap.set(0);
                bitmap.set(1);
            })
            .unwrap();

        let usage = directory.section_usage();
        assert_eq!(
            usage,
            vec![
                SectionUsage {
                    start: 1,
                    allocated: 0
                },
                SectionUsage {
                    start: 1 + S,
                    allocated: 2
                },
            ]
        );
    }

    #[test]
    fn test_image_roundtrip() {
        let mut directory = directory_with(&[1, 1 + S, 1 + 3 * S]);
        directory.modify(1 + S, |bitmap| bitmap.set(17)).unwrap();

        let image = directory.to_image().unwrap();
        let restored = SectionDirectory::from_image(&image).unwrap();
        assert_eq!(restored, directory);
        assert!(restored.is_allocated(1 + S + 17));
    }

    #[test]
    fn test_image_checksum_mismatch() {
        let directory = directory_with(&[1]);
        let mut image = directory.to_image().unwrap();
        let idx = image.len() / 2;
        image[idx] ^= 0xFF;

        assert!(matches!(
            SectionDirectory::from_image(&image),
            Err(PageAllocError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_image_rejects_overlap() {
        let image = DirectoryImage {
            version: IMAGE_VERSION,
            entries: vec![(1, vec![0u8; BITMAP_SIZE]), (100, vec![0u8; BITMAP_SIZE])],
        };
        let mut bytes = bincode::serialize(&image).unwrap();
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());

        assert!(matches!(
            SectionDirectory::from_image(&bytes),
            Err(PageAllocError::OverlappingSections {
                previous: 1,
                next: 100
            })
        ));
    }

    #[test]
    fn test_rejects_section_past_page_space() {
        let mut directory = directory_with(&[1]);
        assert!(matches!(
            directory.register_section(u64::MAX - 10),
            Err(PageAllocError::InvalidPageNumber(_))
        ));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_section_of_near_page_space_end() {
        // Only reachable by bypassing register_section
        let mut directory = SectionDirectory::new();
        let start = u64::MAX - 10;
        assert!(directory.store_mut().insert_new(start, SectionBitmap::new()));

        assert_eq!(directory.section_of(u64::MAX), Some(start));
        assert!(!directory.is_allocated(u64::MAX));
        assert_eq!(directory.section_of(start - 1), None);
    }

    #[test]
    fn test_image_rejects_section_past_page_space() {
        let image = DirectoryImage {
            version: IMAGE_VERSION,
            entries: vec![(u64::MAX - 10, vec![0u8; BITMAP_SIZE])],
        };
        let mut bytes = bincode::serialize(&image).unwrap();
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());

        assert!(matches!(
            SectionDirectory::from_image(&bytes),
            Err(PageAllocError::InvalidPageNumber(k)) if k == u64::MAX - 10
        ));
    }

    #[test]
    fn test_report_three_sections_first_full() {
        let mut directory = directory_with(&[1, 1 + S, 1 + 2 * S]);
        directory
            .modify(1, |bitmap| {
                for index in 0..S as usize {
                    bitmap.set(index);
                }
            })
            .unwrap();

        let report = directory.free_space_report();
        assert_eq!(report.originally_allocated_pages, 3 * S);
        assert_eq!(report.free_pages, 0);
    }

    #[test]
    fn test_image_rejects_wrong_width() {
        let image = DirectoryImage {
            version: IMAGE_VERSION,
            entries: vec![(1, vec![0u8; 8])],
        };
        let mut bytes = bincode::serialize(&image).unwrap();
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());

        assert!(matches!(
            SectionDirectory::from_image(&bytes),
            Err(PageAllocError::InvalidBitmapWidth { actual: 8, .. })
        ));
    }
}
