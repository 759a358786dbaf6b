use crate::core::error::{PageAllocError, Result};

pub const MAGIC: [u8; 8] = *b"CSEC\x00\x01\x00\x00";
pub const VERSION_MAJOR: u16 = 1;
pub const VERSION_MINOR: u16 = 0;

/// Size of a storage page in bytes
pub const PAGE_SIZE: usize = 8192;

/// Size of the embedded header at the start of every page
pub const PAGE_HEADER_SIZE: usize = 64;

/// Width of a section bitmap value in bytes (four 64-bit words)
pub const BITMAP_SIZE: usize = 32;

/// Number of 64-bit words in a section bitmap
pub const BITMAP_WORDS: usize = BITMAP_SIZE / 8;

/// Number of pages tracked by one section bitmap
pub const PAGES_PER_SECTION: usize = BITMAP_SIZE * 8;

/// Label of the directory that backs a structure's allocator
pub const ALLOCATION_STORAGE_NAME: &str = "Allocation-Storage";

/// File header (Page 0 of a file-backed page source)
///
/// Records how many pages physically exist in the file and the high-water
/// mark of reserved page numbers. Page numbers below `next_page` have been
/// handed out at least once and are never reserved again.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Magic number: "CSEC\x00\x01\x00\x00"
    pub magic: [u8; 8],

    /// Format version (major)
    pub version_major: u16,

    /// Format version (minor)
    pub version_minor: u16,

    /// Page size in bytes (always 8192)
    pub page_size: u32,

    /// Number of pages present in the file, header page included
    pub page_count: u64,

    /// First page number that has never been reserved
    pub next_page: u64,
}

impl FileHeader {
    /// Create a header for a file of `page_count` pages with nothing reserved
    pub fn new(page_count: u64) -> Self {
        FileHeader {
            magic: MAGIC,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            page_size: PAGE_SIZE as u32,
            page_count,
            next_page: 1,
        }
    }

    /// Validate the header magic, version and page accounting
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(PageAllocError::InvalidMagic);
        }

        if self.version_major != VERSION_MAJOR {
            return Err(PageAllocError::UnsupportedVersion {
                major: self.version_major,
                minor: self.version_minor,
            });
        }

        if self.page_size != PAGE_SIZE as u32 {
            return Err(PageAllocError::InvalidPageSize(self.page_size));
        }

        // Page 0 is the header itself, so the high-water mark starts at 1
        if self.next_page == 0 || self.next_page > self.page_count {
            return Err(PageAllocError::InvalidPageNumber(self.next_page));
        }

        Ok(())
    }

    /// Serialize header to one full page
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PAGE_SIZE);

        bytes.extend_from_slice(&self.magic);
        bytes.extend_from_slice(&self.version_major.to_le_bytes());
        bytes.extend_from_slice(&self.version_minor.to_le_bytes());
        bytes.extend_from_slice(&self.page_size.to_le_bytes());
        bytes.extend_from_slice(&self.page_count.to_le_bytes());
        bytes.extend_from_slice(&self.next_page.to_le_bytes());

        bytes.resize(PAGE_SIZE, 0);

        bytes
    }

    /// Deserialize and validate a header
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::encoded_len() {
            return Err(PageAllocError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for file header",
            )));
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);

        let header = FileHeader {
            magic,
            version_major: u16::from_le_bytes([bytes[8], bytes[9]]),
            version_minor: u16::from_le_bytes([bytes[10], bytes[11]]),
            page_size: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            page_count: read_u64(&bytes[16..24]),
            next_page: read_u64(&bytes[24..32]),
        };

        header.validate()?;

        Ok(header)
    }

    /// Number of meaningful bytes at the start of the header page
    pub const fn encoded_len() -> usize {
        8 + 2 + 2 + 4 + 8 + 8
    }
}

pub(crate) fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
