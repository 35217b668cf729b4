use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("error with opening the {resource} file {}: {source}", path.display())]
    Open {
        resource: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error with reading the {resource} file: {source}")]
    Read {
        resource: &'static str,
        #[source]
        source: io::Error,
    },

    /// A frame number reported by the page table did not resolve in kpageflags.
    #[error("short read from kpageflags for pfn 0x{pfn:x}: got {got} of {wanted} bytes")]
    ShortFrameFlagsRead { pfn: u64, got: usize, wanted: usize },

    #[error("unable to grow storage to {requested} entries: {source}")]
    Allocation {
        requested: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("requested capacity overflows usize")]
    CapacityOverflow,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("error with creating {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error with writing page data: {0}")]
    Write(#[source] io::Error),
}
