use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, NativeEndian};

use crate::entry::{PagemapEntry, ENTRY_SIZE};
use crate::error::{Error, Result};
use crate::{read_full_at, AddressRange, PageInfo, PositionedRead};

pub struct PageTable<R> {
    source: R,
    page_size: u64,
}

impl PageTable<File> {
    // This is why we need to run the program as root
    pub fn open(path: &Path, page_size: u64) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Open {
            resource: "pagemap",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(PageTable::new(file, page_size))
    }
}

impl<R: PositionedRead> PageTable<R> {
    pub fn new(source: R, page_size: u64) -> Self {
        PageTable { source, page_size }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    // None when the offset does not fit in a u64 (tiny page sizes, high addresses)
    pub fn entry_offset(&self, vaddr: u64) -> Option<u64> {
        (vaddr / self.page_size).checked_mul(ENTRY_SIZE as u64)
    }

    /// Reads the raw entries for every page of `range` with one positioned
    /// read. The result may be shorter than the range when the source runs
    /// out, so callers must go by its length.
    pub fn read_entries(&self, range: &AddressRange) -> Result<Vec<PagemapEntry>> {
        let page_count = range.page_count(self.page_size);
        if page_count == 0 {
            return Ok(Vec::new());
        }
        let offset = self
            .entry_offset(range.begin)
            .ok_or(Error::CapacityOverflow)?;
        let byte_len = usize::try_from(page_count)
            .ok()
            .and_then(|n| n.checked_mul(ENTRY_SIZE))
            .ok_or(Error::CapacityOverflow)?;
        let mut raw: Vec<u8> = Vec::new();
        raw.try_reserve_exact(byte_len)
            .map_err(|source| Error::Allocation {
                requested: byte_len,
                source,
            })?;
        raw.resize(byte_len, 0);

        let nread = read_full_at(&self.source, &mut raw, offset)
            .map_err(|source| Error::Read {
                resource: "pagemap",
                source,
            })?;
        let count = nread / ENTRY_SIZE;
        if count < page_count as usize {
            debug!(
                "Short pagemap read for 0x{:x}-0x{:x}: {} of {} entries",
                range.begin, range.end, count, page_count
            );
        }

        Ok(raw
            .chunks_exact(ENTRY_SIZE)
            .take(count)
            .map(|word| PagemapEntry(NativeEndian::read_u64(word)))
            .collect())
    }

    /// Decodes the page states of `range`. `dirty` and `anon` are left unset;
    /// they come from kpageflags for present pages only.
    pub fn read_block(&self, range: &AddressRange) -> Result<Vec<PageInfo>> {
        let entries = self.read_entries(range)?;
        Ok(entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| decode_entry(range.begin + idx as u64 * self.page_size, *entry))
            .collect())
    }
}

pub fn decode_entry(address: u64, entry: PagemapEntry) -> PageInfo {
    let present = entry.present();
    PageInfo {
        address,
        pfn: if present { entry.pfn() } else { 0 },
        swap_offset: if present { 0 } else { entry.swap_offset() },
        file_mapped: entry.file_mapped(),
        swapped: entry.swapped(),
        present,
        dirty: false,
        anon: false,
    }
}
