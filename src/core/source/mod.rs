//! Page sources
//!
//! A page source owns the backing storage and hands out brand-new runs of
//! contiguous pages. The section allocator only ever asks it for whole
//! sections, then addresses the pages of those sections one by one.
//!
//! - [`memory::MemoryPageSource`] - growable in-memory pages (tests, caches)
//! - [`mmap::MmapPageSource`] - memory-mapped file with a persisted header

pub mod memory;
pub mod mmap;

pub use memory::MemoryPageSource;
pub use mmap::MmapPageSource;

use crate::core::error::Result;
use crate::core::page::{PageHeader, PageMut};

/// Backing storage collaborator of the section allocator
pub trait PageSource {
    /// Reserve `count` contiguous, never-before-used, zeroed pages
    ///
    /// Returns the first page number of the run. A source that cannot
    /// provide the whole run fails with `OutOfSpace` and stays unchanged.
    fn reserve_contiguous_run(&mut self, count: u64) -> Result<u64>;

    /// Read-only view of a reserved page
    fn page(&self, page_number: u64) -> Result<&[u8]>;

    /// In-place writable view of a reserved page
    fn page_mut(&mut self, page_number: u64) -> Result<PageMut<'_>>;

    /// Best-effort hint that the given pages will be accessed soon
    fn prefetch_hint(&self, pages: &[u64]) -> Result<()>;

    /// Number of page numbers handed out so far (high-water mark)
    fn reserved_pages(&self) -> u64;

    /// Flush written pages to durable storage
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    /// Break a reserved run into individually addressable single pages
    ///
    /// Every page of the run is stamped with its own page number so that
    /// nothing treats the run as one oversized object.
    fn mark_as_independent_pages(&mut self, first_page: u64, count: u64) -> Result<()> {
        for page_number in first_page..first_page + count {
            self.page_mut(page_number)?
                .set_header(&PageHeader::single(page_number));
        }
        Ok(())
    }
}
