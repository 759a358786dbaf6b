use crate::core::config::EngineConfig;
use crate::core::error::{PageAllocError, Result};
use crate::core::header::PAGE_SIZE;
use crate::core::page::PageMut;
use crate::core::source::PageSource;
use parking_lot::Mutex;

/// In-memory page source
///
/// Pages live in one growable buffer indexed by page number. Page numbers
/// below `first_page` are never handed out.
#[derive(Debug)]
pub struct MemoryPageSource {
    pages: Vec<u8>,
    first_page: u64,
    next_page: u64,
    max_pages: Option<u64>,
    prefetched: Mutex<Vec<Vec<u64>>>,
}

impl MemoryPageSource {
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let first_page = config.first_page.max(1);
        MemoryPageSource {
            pages: vec![0u8; first_page as usize * PAGE_SIZE],
            first_page,
            next_page: first_page,
            max_pages: config.max_pages,
            prefetched: Mutex::new(Vec::new()),
        }
    }

    /// Source that refuses to grow past `max_pages` page numbers
    pub fn with_capacity_limit(max_pages: u64) -> Self {
        let config = EngineConfig {
            max_pages: Some(max_pages),
            ..EngineConfig::default()
        };
        Self::from_config(&config)
    }

    /// Prefetch hints received so far, oldest first
    pub fn prefetch_requests(&self) -> Vec<Vec<u64>> {
        self.prefetched.lock().clone()
    }

    fn offset_of(&self, page_number: u64) -> Result<usize> {
        if page_number < self.first_page || page_number >= self.next_page {
            return Err(PageAllocError::InvalidPageNumber(page_number));
        }
        Ok(page_number as usize * PAGE_SIZE)
    }
}

impl Default for MemoryPageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSource for MemoryPageSource {
    fn reserve_contiguous_run(&mut self, count: u64) -> Result<u64> {
        if let Some(max_pages) = self.max_pages {
            let available = max_pages.saturating_sub(self.next_page);
            if count > available {
                return Err(PageAllocError::OutOfSpace {
                    requested: count,
                    available,
                });
            }
        }

        let first = self.next_page;
        self.next_page += count;
        self.pages.resize(self.next_page as usize * PAGE_SIZE, 0);
        Ok(first)
    }

    fn page(&self, page_number: u64) -> Result<&[u8]> {
        let offset = self.offset_of(page_number)?;
        Ok(&self.pages[offset..offset + PAGE_SIZE])
    }

    fn page_mut(&mut self, page_number: u64) -> Result<PageMut<'_>> {
        let offset = self.offset_of(page_number)?;
        PageMut::new(&mut self.pages[offset..offset + PAGE_SIZE])
    }

    fn prefetch_hint(&self, pages: &[u64]) -> Result<()> {
        self.prefetched.lock().push(pages.to_vec());
        Ok(())
    }

    fn reserved_pages(&self) -> u64 {
        self.next_page
    }
}
