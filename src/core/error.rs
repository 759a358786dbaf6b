use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageAllocError {
    #[error("Invalid attempt to create section {section}, but its bitmap was already there")]
    InvalidExistingBuffer { section: u64 },

    #[error("Invalid attempt to set a value on the non existing section bitmap {section}")]
    InvalidNewBuffer { section: u64 },

    #[error("Tried to release page {0} but couldn't find it in the allocation sections")]
    InvalidPageReleased(u64),

    #[error("Tried to release page {0} but there are no sections in the allocator, invalid state")]
    InvalidEmptySectionState(u64),

    #[error("Section {section} reported free space but its bitmap has no free slot (torn bitmap)")]
    TornBitmap { section: u64 },

    #[error("Out of space: cannot reserve {requested} pages ({available} available)")]
    OutOfSpace { requested: u64, available: u64 },

    #[error("Invalid page number: {0}")]
    InvalidPageNumber(u64),

    #[error("Invalid page flags: {0}")]
    InvalidPageFlags(u8),

    #[error("Invalid bitmap width: expected {expected} bytes, got {actual}")]
    InvalidBitmapWidth { expected: usize, actual: usize },

    #[error("Invalid magic number in header")]
    InvalidMagic,

    #[error("Unsupported format version: {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("Invalid page size: {0}")]
    InvalidPageSize(u32),

    #[error("Directory image checksum verification failed")]
    ChecksumMismatch,

    #[error("Overlapping sections in directory image: {previous} and {next}")]
    OverlappingSections { previous: u64, next: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    ConfigValidation(#[from] validator::ValidationErrors),
}

impl PageAllocError {
    /// True for the allocator invariant violations.
    ///
    /// These indicate caller misuse or a corrupted directory and always abort
    /// the enclosing write transaction.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            PageAllocError::InvalidExistingBuffer { .. }
                | PageAllocError::InvalidNewBuffer { .. }
                | PageAllocError::InvalidPageReleased(_)
                | PageAllocError::InvalidEmptySectionState(_)
                | PageAllocError::TornBitmap { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PageAllocError>;
