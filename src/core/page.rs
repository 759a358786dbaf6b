use crate::core::error::{PageAllocError, Result};
use crate::core::header::{read_u64, PAGE_HEADER_SIZE, PAGE_SIZE};

/// Page flags stored in the embedded page header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageFlags {
    /// Never written since the page source reserved it
    Free = 0,
    /// Independently addressable single page
    Single = 1,
    /// First page of a multi-page object
    Overflow = 2,
}

impl PageFlags {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PageFlags::Free),
            1 => Ok(PageFlags::Single),
            2 => Ok(PageFlags::Overflow),
            _ => Err(PageAllocError::InvalidPageFlags(value)),
        }
    }
}

/// Page header (64 bytes)
///
/// Layout:
/// - bytes 0..8: page number
/// - byte 8: flags
/// - bytes 12..16: overflow size (byte length of a multi-page object)
/// - remaining bytes reserved, always zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_number: u64,
    pub flags: PageFlags,
    pub overflow_size: u32,
}

impl PageHeader {
    /// Canonical header of a free single page
    pub fn single(page_number: u64) -> Self {
        PageHeader {
            page_number,
            flags: PageFlags::Single,
            overflow_size: 0,
        }
    }

    pub const fn size() -> usize {
        PAGE_HEADER_SIZE
    }

    pub fn to_bytes(&self) -> [u8; PAGE_HEADER_SIZE] {
        let mut bytes = [0u8; PAGE_HEADER_SIZE];
        bytes[0..8].copy_from_slice(&self.page_number.to_le_bytes());
        bytes[8] = self.flags as u8;
        bytes[12..16].copy_from_slice(&self.overflow_size.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::size() {
            return Err(PageAllocError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for page header",
            )));
        }

        Ok(PageHeader {
            page_number: read_u64(&bytes[0..8]),
            flags: PageFlags::from_u8(bytes[8])?,
            overflow_size: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }
}

/// Decode the header of an immutable page buffer
pub fn read_header(page: &[u8]) -> Result<PageHeader> {
    PageHeader::from_bytes(page)
}

/// Writable view of one page owned by a page source
///
/// Structure: [Header (64 bytes)][Data (8128 bytes)]. The view borrows the
/// page source mutably, so the bytes stay valid until the view is dropped.
pub struct PageMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> PageMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(PageAllocError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "Page view must be exactly {} bytes, got {}",
                    PAGE_SIZE,
                    bytes.len()
                ),
            )));
        }
        Ok(PageMut { bytes })
    }

    pub fn header(&self) -> Result<PageHeader> {
        PageHeader::from_bytes(self.bytes)
    }

    pub fn set_header(&mut self, header: &PageHeader) {
        self.bytes[..PAGE_HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes[PAGE_HEADER_SIZE..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[PAGE_HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }

    /// Zero the page and stamp it as a free single page
    ///
    /// Stale content and flags (e.g. an old overflow length) must not leak
    /// into whatever reuses the page next.
    pub fn reset_as_free_single(&mut self, page_number: u64) {
        self.bytes.fill(0);
        self.set_header(&PageHeader::single(page_number));
    }
}
