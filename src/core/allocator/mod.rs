//! Section-based single-page allocator
//!
//! Pages are reserved from the page source in sections of
//! [`PAGES_PER_SECTION`] contiguous pages. Each section is tracked by one
//! fixed-width bitmap in the [`SectionDirectory`], keyed by the section's
//! first page number.
//!
//! Allocation prefers the section that contains (or precedes) a caller
//! supplied "nearby" page, then walks the directory cyclically until it
//! finds a section with room. Only when every section is full does it grow a
//! new one. Freed pages return to their section's bitmap; sections are never
//! removed.

pub mod bitmap;

use crate::core::directory::{SectionDirectory, SectionStore};
use crate::core::error::{PageAllocError, Result};
use crate::core::header::{ALLOCATION_STORAGE_NAME, PAGES_PER_SECTION};
use crate::core::source::PageSource;
use serde::Serialize;
use tracing::{debug, error, warn};

const SECTION_PAGES: u64 = PAGES_PER_SECTION as u64;

/// Capacity summary of one allocator
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocationReport {
    /// Pages ever reserved as sections (entries x section size)
    pub originally_allocated_pages: u64,

    /// Free pages, sampled from the first section only
    pub free_pages: u64,
}

/// Allocator view over one directory and the transaction's page source
pub struct SectionAllocator<'t, S: SectionStore, P: PageSource> {
    directory: &'t mut SectionDirectory<S>,
    source: &'t mut P,
}

impl<'t, S: SectionStore, P: PageSource> SectionAllocator<'t, S, P> {
    pub fn new(directory: &'t mut SectionDirectory<S>, source: &'t mut P) -> Self {
        SectionAllocator { directory, source }
    }

    /// Ensure the allocator owns at least one section
    pub fn create(&mut self) -> Result<()> {
        if self.directory.is_empty() {
            self.grow_one_section()?;
        }
        Ok(())
    }

    pub fn directory(&self) -> &SectionDirectory<S> {
        &*self.directory
    }

    /// Allocate one page, as close to `nearby_page` as possible
    pub fn allocate_single_page(&mut self, nearby_page: u64) -> Result<u64> {
        let Some(start_key) = self.starting_section(nearby_page) else {
            return self.allocate_from_new_section();
        };

        let mut current = start_key;
        loop {
            let has_space = self
                .directory
                .bitmap(current)
                .map(|bitmap| bitmap.has_space())
                .unwrap_or(false);

            if has_space {
                let slot = self.directory.modify(current, |bitmap| {
                    let slot = bitmap.first_free();
                    if let Some(index) = slot {
                        bitmap.set(index);
                    }
                    slot
                })?;

                return match slot {
                    Some(index) => Ok(current + index as u64),
                    None => {
                        error!(
                            "Section {} in {} reported free space but has no free slot",
                            current, ALLOCATION_STORAGE_NAME
                        );
                        Err(PageAllocError::TornBitmap { section: current })
                    }
                };
            }

            match self.directory.next_section_cyclic(current, start_key) {
                Some(next) => current = next,
                None => break,
            }
        }

        self.allocate_from_new_section()
    }

    /// Return a page to its section
    pub fn free_page(&mut self, page_number: u64) -> Result<()> {
        if self.directory.is_empty() {
            return Err(PageAllocError::InvalidEmptySectionState(page_number));
        }

        let start = {
            let mut cursor = self.directory.cursor();
            if cursor.seek(page_number) {
                if cursor.current_key() != Some(page_number) {
                    cursor.move_prev();
                }
            } else {
                cursor.seek_to_last();
            }
            cursor.current_key()
        };

        let start = match start {
            Some(start) if page_number >= start && page_number - start < SECTION_PAGES => start,
            _ => return Err(PageAllocError::InvalidPageReleased(page_number)),
        };

        let index = (page_number - start) as usize;
        let was_allocated = self.directory.modify(start, |bitmap| bitmap.clear(index))?;
        if !was_allocated {
            warn!(
                "Double free of page {} in section {}; page was already free",
                page_number, start
            );
        }

        self.source
            .page_mut(page_number)?
            .reset_as_free_single(page_number);
        Ok(())
    }

    pub fn free_space_report(&self) -> AllocationReport {
        self.directory.free_space_report()
    }

    /// Hint the page source to bring every section page into memory
    pub fn prefetch_sections(&self) {
        let mut pages = Vec::with_capacity(self.directory.len() * PAGES_PER_SECTION);
        let mut cursor = self.directory.cursor();
        if cursor.seek_to_first() {
            while let Some(start) = cursor.current_key() {
                pages.extend(start..start.saturating_add(SECTION_PAGES));
                if !cursor.move_next() {
                    break;
                }
            }
        }

        if let Err(e) = self.source.prefetch_hint(&pages) {
            warn!("Prefetch of {} section pages failed: {}", pages.len(), e);
        }
    }

    /// Section where the search for a page near `nearby_page` begins
    fn starting_section(&self, nearby_page: u64) -> Option<u64> {
        let mut cursor = self.directory.cursor();
        if cursor.seek(nearby_page) {
            // The section holding nearby_page starts before it
            if cursor.current_key() != Some(nearby_page) {
                cursor.move_prev();
            }
        } else if !cursor.seek_to_last() {
            return None;
        }
        cursor.current_key()
    }

    fn allocate_from_new_section(&mut self) -> Result<u64> {
        let section = self.grow_one_section()?;
        self.directory.modify(section, |bitmap| bitmap.set(0))?;
        Ok(section)
    }

    fn grow_one_section(&mut self) -> Result<u64> {
        let first_page = self.source.reserve_contiguous_run(SECTION_PAGES)?;
        self.source
            .mark_as_independent_pages(first_page, SECTION_PAGES)?;
        self.directory.register_section(first_page)?;

        debug!(
            "Grew section {}..{} ({} sections in {})",
            first_page,
            first_page + SECTION_PAGES,
            self.directory.len(),
            ALLOCATION_STORAGE_NAME
        );
        Ok(first_page)
    }
}
