#[macro_use]
extern crate scan_fmt;

extern crate byteorder;
extern crate chrono;

#[macro_use]
extern crate log;

pub mod config;
pub mod dump;
pub mod entry;
pub mod error;
pub mod gaps;
pub mod growth;
pub mod kpageflags;
pub mod maps;
pub mod pagemap;
pub mod persist;

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;

pub use config::{Config, GapMode};
pub use error::{Error, Result};

/// One mapped region from `/proc/<pid>/maps`, `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub begin: u64,
    pub end: u64,
}

impl AddressRange {
    pub fn new(begin: u64, end: u64) -> Self {
        AddressRange { begin, end }
    }

    /// Whole pages covered by the range. Zero for degenerate ranges.
    pub fn page_count(&self, page_size: u64) -> u64 {
        self.end.saturating_sub(self.begin) / page_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageInfo {
    pub address: u64,
    // only meaningful when present
    pub pfn: u64,
    // only meaningful when swapped and not present
    pub swap_offset: u64,
    pub file_mapped: bool,
    pub swapped: bool,
    pub present: bool,
    pub dirty: bool,
    pub anon: bool,
}

impl PageInfo {
    /// Set whenever the page is not file mapped. This lumps shared anonymous,
    /// private anonymous and private file pages together; consumers of the
    /// snapshot read it that way, so it stays lossy.
    pub fn shared_or_anonymous(&self) -> bool {
        !self.file_mapped
    }

    /// Frame number for resident pages, swap offset otherwise.
    pub fn primary_value(&self) -> u64 {
        if self.present {
            self.pfn
        } else {
            self.swap_offset
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRecord {
    Page(PageInfo),
    /// Placeholder for the unmapped span starting at this address. Every
    /// flag of a gap is unknown.
    Gap(u64),
}

impl PageRecord {
    pub fn address(&self) -> u64 {
        match self {
            PageRecord::Page(page) => page.address,
            PageRecord::Gap(address) => *address,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, PageRecord::Gap(_))
    }

    pub fn present(&self) -> Option<bool> {
        self.page().map(|p| p.present)
    }

    pub fn swapped(&self) -> Option<bool> {
        self.page().map(|p| p.swapped)
    }

    pub fn dirty(&self) -> Option<bool> {
        self.page().map(|p| p.dirty)
    }

    pub fn anon(&self) -> Option<bool> {
        self.page().map(|p| p.anon)
    }

    fn page(&self) -> Option<&PageInfo> {
        match self {
            PageRecord::Page(page) => Some(page),
            PageRecord::Gap(_) => None,
        }
    }
}

/// Positioned reads, pread style. A return shorter than `buf` means the end
/// of the readable data was reached.
pub trait PositionedRead {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

impl PositionedRead for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        FileExt::read_at(self, buf, offset)
    }
}

impl PositionedRead for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = match usize::try_from(offset) {
            Ok(start) if start < self.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}

impl PositionedRead for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }
}

impl<T: PositionedRead + ?Sized> PositionedRead for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

/// Fills `buf` from `offset`, stopping early only at end of data.
pub(crate) fn read_full_at<R: PositionedRead + ?Sized>(
    reader: &R,
    buf: &mut [u8],
    offset: u64,
) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read_at(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
