//! Transactional engine around the section allocator
//!
//! One writer at a time holds the page source (a `parking_lot::Mutex`) and
//! works on a private copy of the committed structure catalog. Commit
//! publishes that copy atomically; dropping or rolling back the transaction
//! throws it away. Readers take an `Arc` snapshot of the last committed
//! catalog and never wait for the writer.

use crate::core::allocator::{AllocationReport, SectionAllocator};
use crate::core::config::EngineConfig;
use crate::core::directory::{BTreeSectionStore, SectionDirectory, SectionStore};
use crate::core::error::{PageAllocError, Result};
use crate::core::header::PAGES_PER_SECTION;
use crate::core::page::PageMut;
use crate::core::source::PageSource;
use ahash::AHashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Structure name -> section directory
type Catalog = AHashMap<String, SectionDirectory>;

pub struct Engine<P: PageSource> {
    committed: RwLock<Arc<Catalog>>,
    source: Mutex<P>,
    config: EngineConfig,
    next_txn_id: AtomicU64,
}

impl<P: PageSource> Engine<P> {
    pub fn new(source: P, config: EngineConfig) -> Self {
        info!(
            "Engine ready ({} pages reserved, sync_on_commit={})",
            source.reserved_pages(),
            config.sync_on_commit
        );

        Engine {
            committed: RwLock::new(Arc::new(Catalog::new())),
            source: Mutex::new(source),
            config,
            next_txn_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the single write transaction, waiting for the current writer
    pub fn begin_write(&self) -> WriteTransaction<'_, P> {
        let source = self.source.lock();
        let working = Catalog::clone(&self.committed.read());
        let id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);

        debug!("Write transaction {} started", id);
        WriteTransaction {
            engine: self,
            source,
            working,
            id,
        }
    }

    /// Snapshot of the last committed state
    pub fn begin_read(&self) -> ReadTransaction {
        ReadTransaction {
            snapshot: Arc::clone(&self.committed.read()),
        }
    }
}

/// Exclusive, copy-on-write transaction over the structure catalog
///
/// Nothing the transaction does to a directory is visible to readers until
/// [`WriteTransaction::commit`].
pub struct WriteTransaction<'e, P: PageSource> {
    engine: &'e Engine<P>,
    source: MutexGuard<'e, P>,
    working: Catalog,
    id: u64,
}

impl<'e, P: PageSource> WriteTransaction<'e, P> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Allocator for `structure`, creating an empty directory on first use
    pub fn allocator(&mut self, structure: &str) -> SectionAllocator<'_, BTreeSectionStore, P> {
        let directory = self.working.entry(structure.to_string()).or_default();
        SectionAllocator::new(directory, &mut *self.source)
    }

    pub fn directory(&self, structure: &str) -> Option<&SectionDirectory> {
        self.working.get(structure)
    }

    pub fn page(&self, page_number: u64) -> Result<&[u8]> {
        self.source.page(page_number)
    }

    pub fn page_mut(&mut self, page_number: u64) -> Result<PageMut<'_>> {
        self.source.page_mut(page_number)
    }

    /// Replace a structure's directory with a decoded image
    ///
    /// Every section in the image must lie inside pages the source has
    /// already reserved, at or above `first_page`, and must not overlap a
    /// section owned by any other structure.
    pub fn restore_directory(&mut self, structure: &str, image: &[u8]) -> Result<()> {
        let directory = SectionDirectory::from_image(image)?;
        let section_pages = PAGES_PER_SECTION as u64;

        if let Some(first) = directory.store().first_key() {
            if first < self.engine.config.first_page {
                return Err(PageAllocError::InvalidPageNumber(first));
            }
        }

        let reserved = self.source.reserved_pages();
        if let Some(last) = directory.store().last_key() {
            let end = last
                .checked_add(section_pages)
                .ok_or(PageAllocError::InvalidPageNumber(last))?;
            if end > reserved {
                return Err(PageAllocError::InvalidPageNumber(end - 1));
            }
        }

        for (name, other) in self.working.iter() {
            if name == structure {
                continue;
            }
            for (start, _) in directory.store().iter() {
                // Sections overlap when their starts are less than S apart
                let Some(clash) = other
                    .store()
                    .seek_ge(start.saturating_sub(section_pages - 1))
                else {
                    continue;
                };
                if clash < start + section_pages {
                    return Err(PageAllocError::OverlappingSections {
                        previous: start.min(clash),
                        next: start.max(clash),
                    });
                }
            }
        }

        debug!(
            "Restored {} sections for '{}' in transaction {}",
            directory.len(),
            structure,
            self.id
        );
        self.working.insert(structure.to_string(), directory);
        Ok(())
    }

    /// Publish the working set
    pub fn commit(self) -> Result<()> {
        let WriteTransaction {
            engine,
            mut source,
            working,
            id,
        } = self;

        if engine.config.sync_on_commit {
            source.sync()?;
        }

        *engine.committed.write() = Arc::new(working);
        drop(source);

        debug!("Write transaction {} committed", id);
        Ok(())
    }

    /// Discard the working set
    ///
    /// Page numbers reserved by this transaction are not returned to the
    /// source; they are simply never handed out again.
    pub fn rollback(self) {
        debug!("Write transaction {} rolled back", self.id);
    }
}

/// Read-only view of one committed catalog
#[derive(Clone)]
pub struct ReadTransaction {
    snapshot: Arc<Catalog>,
}

impl ReadTransaction {
    /// Structure names, sorted
    pub fn structures(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.snapshot.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn directory(&self, structure: &str) -> Option<&SectionDirectory> {
        self.snapshot.get(structure)
    }

    pub fn report(&self, structure: &str) -> AllocationReport {
        self.snapshot
            .get(structure)
            .map(SectionDirectory::free_space_report)
            .unwrap_or_default()
    }

    pub fn is_allocated(&self, structure: &str, page_number: u64) -> bool {
        self.snapshot
            .get(structure)
            .map(|directory| directory.is_allocated(page_number))
            .unwrap_or(false)
    }

    /// Encoded directory of `structure`, if it exists
    pub fn directory_image(&self, structure: &str) -> Result<Option<Vec<u8>>> {
        self.snapshot
            .get(structure)
            .map(SectionDirectory::to_image)
            .transpose()
    }
}
