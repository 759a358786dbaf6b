//! Core storage layer
//!
//! - [`header`] - Page geometry constants and the file header (Page 0)
//! - [`page`] - Embedded page header and writable page views
//! - [`allocator`] - Section allocator:
//!   - [`allocator::bitmap`] - Fixed-width 256-slot section bitmap
//! - [`directory`] - Ordered section directory and its cursor
//! - [`source`] - Page sources (in-memory and memory-mapped file)
//! - [`engine`] - Single-writer copy-on-write transactions
//! - [`config`] - TOML engine configuration
//! - [`error`] - Error types

pub mod allocator;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod header;
pub mod page;
pub mod source;

pub use allocator::{AllocationReport, SectionAllocator};
pub use config::EngineConfig;
pub use engine::{Engine, ReadTransaction, WriteTransaction};
pub use error::{PageAllocError, Result};
