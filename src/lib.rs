//! # cartridge-pagealloc - Section-based page allocator
//!
//! Hands out single storage pages to the structures of an embedded,
//! transactional storage engine. Pages are reserved from a page source in
//! sections of 256 contiguous pages; each section's occupancy is one
//! 32-byte bitmap stored in an ordered section directory.
//!
//! - **Locality**: allocations prefer the section holding a "nearby" page
//! - **Bounded growth**: a new section is reserved only when every section is full
//! - **Transactional**: single writer, copy-on-write directories, snapshot readers
//! - **Pluggable storage**: in-memory pages or a memory-mapped file
//!
//! ## Quick Start
//!
//! ```rust
//! use cartridge_pagealloc::{Engine, EngineConfig, MemoryPageSource, Result};
//!
//! # fn main() -> Result<()> {
//! let engine = Engine::new(MemoryPageSource::new(), EngineConfig::default());
//!
//! let mut txn = engine.begin_write();
//! let root = txn.allocator("users").allocate_single_page(0)?;
//! let child = txn.allocator("users").allocate_single_page(root)?;
//! txn.commit()?;
//!
//! let read = engine.begin_read();
//! assert!(read.is_allocated("users", root));
//! assert!(read.is_allocated("users", child));
//! # Ok(())
//! # }
//! ```
//!
//! ## File-backed pages
//!
//! ```rust,no_run
//! use cartridge_pagealloc::{Engine, EngineConfig, MmapPageSource, Result};
//!
//! # fn main() -> Result<()> {
//! let config = EngineConfig::load("pagealloc.toml")?;
//! let source = MmapPageSource::create("data.pages", &config)?;
//! let engine = Engine::new(source, config);
//!
//! let mut txn = engine.begin_write();
//! txn.allocator("index").create()?;
//! txn.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    allocator::{bitmap::SectionBitmap, AllocationReport, SectionAllocator},
    config::EngineConfig,
    directory::{BTreeSectionStore, DirectoryCursor, SectionDirectory, SectionStore, SectionUsage},
    engine::{Engine, ReadTransaction, WriteTransaction},
    error::{PageAllocError, Result},
    header::{FileHeader, PAGES_PER_SECTION, PAGE_HEADER_SIZE, PAGE_SIZE},
    page::{read_header, PageFlags, PageHeader, PageMut},
    source::{MemoryPageSource, MmapPageSource, PageSource},
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
