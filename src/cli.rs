//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use capcache_core::download::DEFAULT_MAX_RETRIES;
use capcache_core::pipeline::DEFAULT_CONCURRENCY;

/// Default cache root, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Download public packet captures once and keep a deduplicated metadata cache.
///
/// Every link is fetched into the cache directory, archives are expanded,
/// and each capture is summarized with the Wireshark tools. Results are
/// merged into `<cache-dir>/captures.json`, keyed by content hash.
#[derive(Parser, Debug, Clone)]
#[command(name = "capcache")]
#[command(author, version, about)]
pub struct Args {
    /// Link file: one `url<TAB>description` per line
    #[arg(long, value_name = "FILE")]
    pub links: PathBuf,

    /// Cache root for downloads and captures.json
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Maximum concurrent units (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Retries after the first attempt for throttled downloads (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Process links again whose earlier attempt only produced a failure record
    #[arg(long)]
    pub retry_failed: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
