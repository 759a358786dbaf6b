//! Engine configuration
//!
//! Loaded from TOML and validated before any page source is built:
//!
//! ```toml
//! first_page = 1
//! max_pages = 1048576
//! growth_pages = 1024
//! sync_on_commit = true
//! ```

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Lowest page number a page source may hand out (page 0 is the header)
    #[validate(range(min = 1))]
    pub first_page: u64,

    /// Upper bound on reserved pages, header page included; at least one section
    #[validate(range(min = 256))]
    pub max_pages: Option<u64>,

    /// Minimum number of pages a file-backed source grows by
    #[validate(range(min = 1))]
    pub growth_pages: u64,

    /// Flush the page source when a write transaction commits
    pub sync_on_commit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            first_page: 1,
            max_pages: None,
            growth_pages: 1024,
            sync_on_commit: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}
