extern crate page_snapshot;
extern crate simplelog;

#[macro_use]
extern crate log;

use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use simplelog::*;

use page_snapshot::config::{system_page_size, PROC_ROOT};
use page_snapshot::growth::{GrowthPolicy, INIT_ARR_SIZE, RESIZE_FACTOR};
use page_snapshot::{dump, persist, Config, GapMode};

/// Writes a per-page residency snapshot of a process to <OUTPUT_DIR>/<PID>_page_data.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Process to inspect
    pid: u32,

    /// Directory the snapshot is written to
    output_dir: PathBuf,

    /// Emit one sentinel record for every unmapped hole between regions
    #[arg(long)]
    gaps: bool,

    /// Read kpageflags once per run of consecutive frames
    #[arg(long)]
    batch_kpageflags: bool,

    /// Initial capacity of the range and page lists
    #[arg(long, default_value_t = INIT_ARR_SIZE)]
    initial_capacity: usize,

    /// Factor the range and page lists grow by
    #[arg(long, default_value_t = RESIZE_FACTOR)]
    growth_factor: f64,

    /// Page size in bytes (defaults to the system page size)
    #[arg(long)]
    page_size: Option<u64>,

    /// Where procfs is mounted
    #[arg(long, default_value = PROC_ROOT)]
    proc_root: PathBuf,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            gap_mode: if self.gaps {
                GapMode::Sentinels
            } else {
                GapMode::Off
            },
            growth: GrowthPolicy {
                initial_capacity: self.initial_capacity,
                factor: self.growth_factor,
            },
            page_size: self.page_size.unwrap_or_else(system_page_size),
            batch_frame_flags: self.batch_kpageflags,
            proc_root: self.proc_root.clone(),
        }
    }

    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn run(cli: &Cli) -> page_snapshot::Result<()> {
    let start_time = Utc::now();
    let config = cli.config();
    info!("PID supplied: {}", cli.pid);

    let process_pages = dump::get_pages(cli.pid, &config)?;
    let counters = process_pages.counters;
    if counters.rejected_lines > 0 {
        warn!("Skipped {} malformed maps lines", counters.rejected_lines);
    }
    if config.gap_mode == GapMode::Sentinels {
        println!("Amount of unused blocks: {}", counters.gaps);
    }
    println!("Pages scanned: {}", counters.pages);
    debug!("kpageflags lookups: {}", counters.frame_lookups);

    let (_, written) = persist::write_snapshot(&cli.output_dir, cli.pid, &process_pages.records)?;
    println!("Records written: {}", written);
    info!(
        "---------- Completed snapshot in {} ms ----------",
        (Utc::now() - start_time).num_milliseconds()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = TermLogger::init(
        cli.log_level(),
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("Unable to set up logging: {}", e);
    }

    if let Err(e) = run(&cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
