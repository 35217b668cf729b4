use chrono::Utc;

use crate::config::Config;
use crate::error::Result;
use crate::gaps::GapTracker;
use crate::growth::GrowthPolicy;
use crate::kpageflags::FrameFlagsResolver;
use crate::maps;
use crate::pagemap::PageTable;
use crate::{AddressRange, PageRecord, PositionedRead};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanCounters {
    pub ranges: usize,
    pub rejected_lines: usize,
    pub pages: u64, // sentinels not counted
    pub gaps: u64,
    pub frame_lookups: u64,
}

#[derive(Debug)]
pub struct ProcessPages {
    pub pid: u32,
    pub records: Vec<PageRecord>,
    pub counters: ScanCounters,
}

/// Walks ranges through the page table and kpageflags, collecting records.
pub struct PageScanner<P, K> {
    page_table: PageTable<P>,
    flags: FrameFlagsResolver<K>,
    gaps: GapTracker,
    growth: GrowthPolicy,
    pages: u64,
}

impl<P: PositionedRead, K: PositionedRead> PageScanner<P, K> {
    pub fn new(
        page_table: PageTable<P>,
        flags: FrameFlagsResolver<K>,
        gaps: GapTracker,
        growth: GrowthPolicy,
    ) -> Self {
        PageScanner {
            page_table,
            flags,
            gaps,
            growth,
            pages: 0,
        }
    }

    /// Appends the records of one range. Returns the number of pages decoded,
    /// which is short of the range size when the page table ran out.
    pub fn scan_range(&mut self, range: &AddressRange, records: &mut Vec<PageRecord>) -> Result<u64> {
        if let Some(gap) = self.gaps.before_range(range) {
            self.growth.push(records, gap)?;
        }
        let mut block = self.page_table.read_block(range)?;
        self.flags.resolve(&mut block)?;
        self.growth.reserve(records, block.len())?;
        let decoded = block.len() as u64;
        records.extend(block.into_iter().map(PageRecord::Page));
        self.pages += decoded;
        self.gaps.after_range(range);
        Ok(decoded)
    }

    pub fn scan(&mut self, ranges: &[AddressRange]) -> Result<Vec<PageRecord>> {
        let mut records = Vec::new();
        for range in ranges {
            self.scan_range(range, &mut records)?;
        }
        Ok(records)
    }

    pub fn counters(&self) -> ScanCounters {
        ScanCounters {
            pages: self.pages,
            gaps: self.gaps.gaps(),
            frame_lookups: self.flags.lookups(),
            ..Default::default()
        }
    }
}

/// Parses the maps of `pid`, then walks every range. All three procfs files
/// are opened up front, before any page is read.
pub fn get_pages(pid: u32, config: &Config) -> Result<ProcessPages> {
    config.validate()?;
    let regions = maps::get_regions(&config.maps_path(pid), &config.growth)?;
    println!("Mapped blocks count: {}", regions.ranges.len());

    let page_table = PageTable::open(&config.pagemap_path(pid), config.page_size)?;
    let flags = FrameFlagsResolver::open(&config.kpageflags_path(), config.batch_frame_flags)?;

    let start_time = Utc::now();
    let mut scanner = PageScanner::new(
        page_table,
        flags,
        GapTracker::new(config.gap_mode),
        config.growth,
    );
    let records = scanner.scan(&regions.ranges)?;
    debug!(
        "Scanned {} ranges in {} ms",
        regions.ranges.len(),
        (Utc::now() - start_time).num_milliseconds()
    );

    let counters = ScanCounters {
        ranges: regions.ranges.len(),
        rejected_lines: regions.rejected,
        ..scanner.counters()
    };
    Ok(ProcessPages {
        pid,
        records,
        counters,
    })
}
