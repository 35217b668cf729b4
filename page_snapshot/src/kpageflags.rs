use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, NativeEndian};

use crate::entry::{FrameFlags, ENTRY_SIZE};
use crate::error::{Error, Result};
use crate::{read_full_at, PageInfo, PositionedRead};

/// Looks up per-frame flags in a `/proc/kpageflags` style source.
pub struct FrameFlagsResolver<R> {
    source: R,
    batch: bool,
    lookups: u64,
}

impl FrameFlagsResolver<File> {
    pub fn open(path: &Path, batch: bool) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Open {
            resource: "kpageflags",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(FrameFlagsResolver::new(file, batch))
    }
}

impl<R: PositionedRead> FrameFlagsResolver<R> {
    pub fn new(source: R, batch: bool) -> Self {
        FrameFlagsResolver {
            source,
            batch,
            lookups: 0,
        }
    }

    pub fn lookups(&self) -> u64 {
        self.lookups
    }

    /// Flags of a single frame. Frames of a live process always resolve, so
    /// anything short of a whole entry is an error.
    pub fn lookup(&mut self, pfn: u64) -> Result<FrameFlags> {
        let mut flags = self.lookup_run(pfn, 1)?;
        Ok(flags.remove(0))
    }

    /// Flags of `len` consecutive frames starting at `pfn`, in one read.
    pub fn lookup_run(&mut self, pfn: u64, len: usize) -> Result<Vec<FrameFlags>> {
        let wanted = len * ENTRY_SIZE;
        let mut raw = vec![0u8; wanted];
        self.lookups += 1;
        let got = read_full_at(&self.source, &mut raw, pfn * ENTRY_SIZE as u64).map_err(
            |source| Error::Read {
                resource: "kpageflags",
                source,
            },
        )?;
        if got < wanted {
            return Err(Error::ShortFrameFlagsRead { pfn, got, wanted });
        }
        let mut words = vec![0u64; len];
        NativeEndian::read_u64_into(&raw, &mut words);
        Ok(words.into_iter().map(FrameFlags).collect())
    }

    /// Fills in `dirty` and `anon` for the present pages of a block. Pages
    /// that are not present keep both unset and cost no lookup.
    pub fn resolve(&mut self, block: &mut [PageInfo]) -> Result<()> {
        if self.batch {
            return self.resolve_batched(block);
        }
        for page in block.iter_mut().filter(|p| p.present) {
            apply(page, self.lookup(page.pfn)?);
        }
        Ok(())
    }

    fn resolve_batched(&mut self, block: &mut [PageInfo]) -> Result<()> {
        let mut idx = 0;
        while idx < block.len() {
            if !block[idx].present {
                idx += 1;
                continue;
            }
            let run = contiguous_frame_run(&block[idx..]);
            let flags = self.lookup_run(block[idx].pfn, run)?;
            for (page, flags) in block[idx..idx + run].iter_mut().zip(flags) {
                apply(page, flags);
            }
            idx += run;
        }
        Ok(())
    }
}

fn apply(page: &mut PageInfo, flags: FrameFlags) {
    page.dirty = flags.dirty();
    page.anon = flags.anon();
}

// Given a slice starting at a present page, returns how many pages in a row
// are present with consecutive frame numbers.
fn contiguous_frame_run(pages: &[PageInfo]) -> usize {
    let first = pages[0].pfn;
    pages
        .iter()
        .enumerate()
        .take_while(|(idx, page)| page.present && page.pfn == first + *idx as u64)
        .count()
}
