// Snapshot file layout, no header or trailer, record count is size / 12:
// 0..8  : frame number if present, swap offset if swapped, 0 for a gap
// 8..12 : flags word
//         bit 4  : dirty
//         bit 12 : anonymous
//         bit 26 : present
// All integers little endian.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};

use crate::entry::RecordFlags;
use crate::error::{Error, Result};
use crate::{PageInfo, PageRecord};

pub const RECORD_SIZE: usize = 12;
// divisible by 12, holds 341 records
pub const CHUNK_SIZE: usize = 4092;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedRecord {
    pub value: u64,
    pub flags: RecordFlags,
}

impl EncodedRecord {
    pub fn from_page(page: &PageInfo) -> Self {
        EncodedRecord {
            value: page.primary_value(),
            flags: RecordFlags::new(page.dirty, page.anon, page.present),
        }
    }

    pub fn gap_sentinel() -> Self {
        EncodedRecord {
            value: 0,
            flags: RecordFlags::default(),
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        LittleEndian::write_u64(&mut bytes[..8], self.value);
        LittleEndian::write_u32(&mut bytes[8..], self.flags.0);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        EncodedRecord {
            value: LittleEndian::read_u64(&bytes[..8]),
            flags: RecordFlags(LittleEndian::read_u32(&bytes[8..])),
        }
    }

    pub fn dirty(&self) -> bool {
        self.flags.dirty()
    }

    pub fn anon(&self) -> bool {
        self.flags.anon()
    }

    pub fn present(&self) -> bool {
        self.flags.present()
    }

    /// A swapped page with swap offset 0 and no flags looks the same.
    pub fn is_gap_sentinel(&self) -> bool {
        self.value == 0 && self.flags.0 == 0
    }
}

/// Applies the sparse policy: pages that are neither present nor swapped are
/// dropped, gap sentinels are always kept.
pub fn encode(record: &PageRecord) -> Option<EncodedRecord> {
    match record {
        PageRecord::Gap(_) => Some(EncodedRecord::gap_sentinel()),
        PageRecord::Page(page) if page.present || page.swapped => {
            Some(EncodedRecord::from_page(page))
        }
        PageRecord::Page(_) => None,
    }
}

/// Buffers encoded records and hands them to `sink` in whole chunks.
pub struct RecordWriter<W: Write> {
    sink: W,
    buffer: Vec<u8>,
    chunk_size: usize,
    records: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        RecordWriter::with_chunk_records(sink, CHUNK_SIZE / RECORD_SIZE)
    }

    /// Flushes every `records_per_chunk` records (at least one).
    pub fn with_chunk_records(sink: W, records_per_chunk: usize) -> Self {
        let chunk_size = records_per_chunk.max(1) * RECORD_SIZE;
        RecordWriter {
            sink,
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
            records: 0,
        }
    }

    /// Encodes `record` if the sparse policy keeps it. Returns whether it did.
    pub fn push(&mut self, record: &PageRecord) -> Result<bool> {
        let encoded = match encode(record) {
            Some(encoded) => encoded,
            None => return Ok(false),
        };
        self.buffer.extend_from_slice(&encoded.to_bytes());
        self.records += 1;
        // if the chunk is full, write it
        if self.buffer.len() >= self.chunk_size {
            self.flush_buffer()?;
        }
        Ok(true)
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.sink.write_all(&self.buffer).map_err(Error::Write)?;
        self.buffer.clear();
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Writes the remainder and returns the sink with the record count.
    pub fn finish(mut self) -> Result<(W, u64)> {
        self.flush_buffer()?;
        self.sink.flush().map_err(Error::Write)?;
        Ok((self.sink, self.records))
    }
}

pub fn write_records<'a, W, I>(sink: W, records: I) -> Result<u64>
where
    W: Write,
    I: IntoIterator<Item = &'a PageRecord>,
{
    let mut writer = RecordWriter::new(sink);
    for record in records {
        writer.push(record)?;
    }
    let (_, count) = writer.finish()?;
    Ok(count)
}

pub fn snapshot_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("{}_page_data", pid))
}

/// Writes `<dir>/<pid>_page_data`. Returns the path and the record count.
pub fn write_snapshot(dir: &Path, pid: u32, records: &[PageRecord]) -> Result<(PathBuf, u64)> {
    let path = snapshot_path(dir, pid);
    println!("Path to saved data: {}", path.display());
    let file = File::create(&path).map_err(|source| Error::Create {
        path: path.clone(),
        source,
    })?;
    let count = write_records(file, records)?;
    Ok((path, count))
}

/// Reads a snapshot back. A trailing fragment shorter than a record is ignored.
pub fn read_snapshot<R: Read>(mut reader: R) -> Result<Vec<EncodedRecord>> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|source| Error::Read {
            resource: "snapshot",
            source,
        })?;
    Ok(data
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let mut bytes = [0u8; RECORD_SIZE];
            bytes.copy_from_slice(chunk);
            EncodedRecord::from_bytes(&bytes)
        })
        .collect())
}
