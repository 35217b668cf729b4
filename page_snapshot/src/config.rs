use std::path::{Path, PathBuf};

use crate::entry::ENTRY_SIZE;
use crate::error::{Error, Result};
use crate::growth::GrowthPolicy;

pub const PROC_ROOT: &str = "/proc";

/// Whether unmapped holes between regions show up in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapMode {
    #[default]
    Off,
    Sentinels,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gap_mode: GapMode,
    pub growth: GrowthPolicy,
    pub page_size: u64,
    /// Read kpageflags once per run of consecutive frame numbers instead of
    /// once per present page.
    pub batch_frame_flags: bool,
    pub proc_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gap_mode: GapMode::default(),
            growth: GrowthPolicy::default(),
            page_size: system_page_size(),
            batch_frame_flags: false,
            proc_root: PathBuf::from(PROC_ROOT),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.growth.validate()?;
        if !self.page_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "page size must be a power of two, got {}",
                self.page_size
            )));
        }
        if self.page_size < ENTRY_SIZE as u64 {
            return Err(Error::InvalidConfig(format!(
                "page size must be at least {} bytes, got {}",
                ENTRY_SIZE, self.page_size
            )));
        }
        Ok(())
    }

    pub fn maps_path(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string()).join("maps")
    }

    pub fn pagemap_path(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string()).join("pagemap")
    }

    pub fn kpageflags_path(&self) -> PathBuf {
        self.proc_root.join("kpageflags")
    }

    pub fn with_proc_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.proc_root = root.as_ref().to_path_buf();
        self
    }
}

pub fn system_page_size() -> u64 {
    rustix::param::page_size() as u64
}
