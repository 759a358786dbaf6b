//! Memory-mapped file page source
//!
//! The file is a plain concatenation of pages. Page 0 holds the
//! [`FileHeader`], which persists the high-water mark of reserved page
//! numbers so that a reopened file never hands out a page number twice.
//!
//! ```text
//! Offset 0:        Page 0 (FileHeader)
//! Offset 8192:     Page 1
//! Offset 16384:    Page 2
//! ...
//! ```
//!
//! Growth extends the file with `set_len` and remaps it. `reserve` and
//! `page_mut` take `&mut self`, so no page view can outlive a remap.

use crate::core::config::EngineConfig;
use crate::core::error::{PageAllocError, Result};
use crate::core::header::{FileHeader, PAGE_SIZE};
use crate::core::page::PageMut;
use crate::core::source::PageSource;
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug)]
pub struct MmapPageSource {
    file: File,
    mmap: MmapMut,
    path: PathBuf,
    header: FileHeader,
    first_page: u64,
    growth_pages: u64,
    max_pages: Option<u64>,
}

impl MmapPageSource {
    /// Create (or truncate) a page file
    pub fn create<P: AsRef<Path>>(path: P, config: &EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        let first_page = config.first_page.max(1);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut header = FileHeader::new(first_page);
        header.next_page = first_page;
        file.set_len(first_page * PAGE_SIZE as u64)?;

        // SAFETY: the file was just created with exclusive read/write access
        // and sized to a whole number of pages. The map lives as long as
        // `self` and is only reached through bounds-checked page accessors.
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        mmap[..PAGE_SIZE].copy_from_slice(&header.to_bytes());
        mmap.flush()?;

        info!(
            "Created page file at {:?} with {} pages",
            path, header.page_count
        );

        Ok(MmapPageSource {
            file,
            mmap,
            path: path.to_path_buf(),
            header,
            first_page,
            growth_pages: config.growth_pages.max(1),
            max_pages: config.max_pages,
        })
    }

    /// Open an existing page file and validate its header
    pub fn open<P: AsRef<Path>>(path: P, config: &EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let file_size = file.metadata()?.len();
        if file_size < PAGE_SIZE as u64 || file_size % PAGE_SIZE as u64 != 0 {
            return Err(PageAllocError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Page file {:?} size {} is not a multiple of page size {}",
                    path, file_size, PAGE_SIZE
                ),
            )));
        }

        // SAFETY: see `create`; the file is opened read/write and its size
        // was checked to be a whole number of pages.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let header = FileHeader::from_bytes(&mmap[..PAGE_SIZE])?;

        if header.page_count * PAGE_SIZE as u64 != file_size {
            return Err(PageAllocError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Page file {:?} header records {} pages but file holds {}",
                    path,
                    header.page_count,
                    file_size / PAGE_SIZE as u64
                ),
            )));
        }

        info!(
            "Opened page file at {:?} ({} pages, next page {})",
            path, header.page_count, header.next_page
        );

        Ok(MmapPageSource {
            file,
            mmap,
            path: path.to_path_buf(),
            header,
            first_page: config.first_page.max(1),
            growth_pages: config.growth_pages.max(1),
            max_pages: config.max_pages,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Pages physically present in the file, header page included
    pub fn page_count(&self) -> u64 {
        self.header.page_count
    }

    fn grow_to(&mut self, new_page_count: u64) -> Result<()> {
        self.mmap.flush()?;
        self.file.set_len(new_page_count * PAGE_SIZE as u64)?;

        // SAFETY: `grow_to` takes `&mut self`, so no page view borrowed from
        // the old map can still exist. The file was extended before remapping
        // and the old map is dropped by the assignment.
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        self.header.page_count = new_page_count;

        debug!(
            "Grew page file {:?} to {} pages",
            self.path, new_page_count
        );
        Ok(())
    }

    fn write_header(&mut self) {
        self.mmap[..PAGE_SIZE].copy_from_slice(&self.header.to_bytes());
    }

    fn offset_of(&self, page_number: u64) -> Result<usize> {
        if page_number < self.first_page || page_number >= self.header.next_page {
            return Err(PageAllocError::InvalidPageNumber(page_number));
        }
        Ok(page_number as usize * PAGE_SIZE)
    }
}

impl PageSource for MmapPageSource {
    fn reserve_contiguous_run(&mut self, count: u64) -> Result<u64> {
        let first = self.header.next_page;
        let needed = first + count;

        if let Some(max_pages) = self.max_pages {
            if needed > max_pages {
                return Err(PageAllocError::OutOfSpace {
                    requested: count,
                    available: max_pages.saturating_sub(first),
                });
            }
        }

        if needed > self.header.page_count {
            let mut target = needed.max(self.header.page_count + self.growth_pages);
            if let Some(max_pages) = self.max_pages {
                target = target.min(max_pages);
            }
            self.grow_to(target)?;
        }

        self.header.next_page = needed;
        self.write_header();
        Ok(first)
    }

    fn page(&self, page_number: u64) -> Result<&[u8]> {
        let offset = self.offset_of(page_number)?;
        Ok(&self.mmap[offset..offset + PAGE_SIZE])
    }

    fn page_mut(&mut self, page_number: u64) -> Result<PageMut<'_>> {
        let offset = self.offset_of(page_number)?;
        PageMut::new(&mut self.mmap[offset..offset + PAGE_SIZE])
    }

    fn prefetch_hint(&self, pages: &[u64]) -> Result<()> {
        let mut sorted: Vec<u64> = pages
            .iter()
            .copied()
            .filter(|&p| p < self.header.page_count)
            .collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut idx = 0;
        while idx < sorted.len() {
            let start = sorted[idx];
            let mut end = start + 1;
            idx += 1;
            while idx < sorted.len() && sorted[idx] == end {
                end += 1;
                idx += 1;
            }
            self.advise_will_need(start, end - start)?;
        }
        Ok(())
    }

    fn reserved_pages(&self) -> u64 {
        self.header.next_page
    }

    fn sync(&mut self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

impl MmapPageSource {
    #[cfg(unix)]
    fn advise_will_need(&self, start_page: u64, count: u64) -> Result<()> {
        let offset = start_page as usize * PAGE_SIZE;
        let len = count as usize * PAGE_SIZE;

        // SAFETY: `start_page + count` never exceeds `page_count` (filtered in
        // `prefetch_hint`), so the advised range lies inside the mapping.
        // MADV_WILLNEED is only a hint and does not change memory contents.
        let rc = unsafe {
            libc::madvise(
                self.mmap.as_ptr().add(offset) as *mut libc::c_void,
                len,
                libc::MADV_WILLNEED,
            )
        };
        if rc != 0 {
            return Err(PageAllocError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn advise_will_need(&self, _start_page: u64, _count: u64) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_writes_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");

        let source = MmapPageSource::create(&path, &EngineConfig::default()).unwrap();
        assert_eq!(source.page_count(), 1);
        assert_eq!(source.reserved_pages(), 1);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            PAGE_SIZE as u64
        );
    }

    #[test]
    fn test_reserve_grows_by_growth_step() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");
        let config = EngineConfig {
            growth_pages: 1024,
            ..EngineConfig::default()
        };

        let mut source = MmapPageSource::create(&path, &config).unwrap();
        let first = source.reserve_contiguous_run(256).unwrap();

        assert_eq!(first, 1);
        assert_eq!(source.page_count(), 1025);
        assert_eq!(source.reserved_pages(), 257);
        // Growth slack is not addressable until reserved
        assert!(source.page(300).is_err());
    }

    #[test]
    fn test_reopen_keeps_high_water_mark() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");
        let config = EngineConfig::default();

        {
            let mut source = MmapPageSource::create(&path, &config).unwrap();
            source.reserve_contiguous_run(256).unwrap();
            source.page_mut(10).unwrap().data_mut()[0] = 0xCD;
            source.sync().unwrap();
        }

        let mut source = MmapPageSource::open(&path, &config).unwrap();
        assert_eq!(source.reserved_pages(), 257);
        assert_eq!(source.page_mut(10).unwrap().data()[0], 0xCD);
        assert_eq!(source.reserve_contiguous_run(256).unwrap(), 257);
    }

    #[test]
    fn test_capacity_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");
        let config = EngineConfig {
            max_pages: Some(300),
            ..EngineConfig::default()
        };

        let mut source = MmapPageSource::create(&path, &config).unwrap();
        source.reserve_contiguous_run(256).unwrap();
        assert_eq!(source.page_count(), 300);

        let result = source.reserve_contiguous_run(256);
        assert!(matches!(result, Err(PageAllocError::OutOfSpace { .. })));
        assert_eq!(source.reserved_pages(), 257);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![0xFFu8; PAGE_SIZE]).unwrap();

        let result = MmapPageSource::open(&path, &EngineConfig::default());
        assert!(matches!(result, Err(PageAllocError::InvalidMagic)));
    }

    #[test]
    fn test_prefetch_hint_succeeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");

        let mut source = MmapPageSource::create(&path, &EngineConfig::default()).unwrap();
        source.reserve_contiguous_run(16).unwrap();
        // Duplicates, gaps and out-of-range numbers are tolerated
        source
            .prefetch_hint(&[3, 1, 2, 2, 9, 10, 1_000_000])
            .unwrap();
    }
}
