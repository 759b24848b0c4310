use std::sync::Arc;

use anyhow::{Context, Result};
use capcache_core::archive::{ArchiveExpander, NativeCodec};
use capcache_core::capture::WiresharkTools;
use capcache_core::download::{FetchCache, HttpClient, RetryPolicy};
use capcache_core::persistence::CacheFile;
use capcache_core::pipeline::Pipeline;
use capcache_core::source::FileLinkSource;
use capcache_core::store::known_sources;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::{config, config_runtime};

pub(crate) async fn run_capcache() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (args, cli_sources) = config_runtime::parse_cli_with_sources();

    let loaded = config::load_config(args.config.as_deref())?;
    let args = config_runtime::apply_config_defaults(args, &cli_sources, loaded.config.as_ref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = config_runtime::resolve_default_log_level(&args);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, config = ?loaded.path, "CLI arguments resolved");
    info!("capcache starting");

    let tools = Arc::new(
        WiresharkTools::from_path().context("Wireshark command-line tools are required")?,
    );

    let retry_policy = RetryPolicy::with_max_retries(u32::from(args.max_retries));
    let fetch = FetchCache::new(&args.cache_dir, Arc::new(HttpClient::new()), retry_policy);
    let expander = ArchiveExpander::new(Arc::new(NativeCodec), tools.clone());

    let cache_file = CacheFile::in_dir(&args.cache_dir);
    let prior = cache_file.load().await?;
    info!(path = %cache_file.path().display(), records = prior.len(), "loaded prior cache");

    let pipeline = Pipeline::new(
        usize::from(args.concurrency),
        fetch,
        expander,
        tools.clone(),
        tools,
    )?
    .with_known_sources(known_sources(&prior, !args.retry_failed));

    let links = FileLinkSource::new(&args.links);
    let output = pipeline
        .run(&links)
        .await
        .with_context(|| format!("Run over '{}' aborted", args.links.display()))?;

    let outcome = cache_file.write_if_changed(prior, output.records).await?;
    debug!(?outcome, "persistence finished");

    info!(
        units = output.stats.units(),
        stored = output.stats.stored(),
        failed = output.stats.failed(),
        skipped = output.stats.skipped(),
        "capcache finished"
    );
    Ok(())
}
