//! CLI entry point for capcache.

use anyhow::Result;

mod app;
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    app::runtime::run_capcache().await
}
