//! # Quote Collector
//!
//! Fetches a short text item (a quote or a fact) from a JSON endpoint and
//! appends it to a local JSON collection unless an equivalent item is
//! already there.
//!
//! ## Usage
//!
//! ```sh
//! quote_collector --profile zenquotes -f quotes.json
//! quote_collector --repeat --interval 300
//! ```
//!
//! ## Architecture
//!
//! Each tick runs the same pipeline:
//! 1. **Fetching**: one GET, retried on transport failures only
//! 2. **Extraction**: pick content and attribution out of the payload by field name
//! 3. **Deduplication**: compare the whitespace-normalized text with the collection
//! 4. **Persistence**: rewrite the whole collection file when the item is new
//!
//! In repeating mode the loop sleeps between ticks and stops cleanly on Ctrl-C.

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod errors;
mod fetcher;
mod models;
mod pipeline;
mod store;
#[cfg(test)]
mod testutil;
mod utils;

use cli::Cli;
use config::RunMode;
use fetcher::build_fetcher;
use pipeline::{Collector, ItemSource};
use store::Store;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");
    let config = args.into_config()?;
    info!(
        url = %config.fetch.url,
        path = %config.store_path.display(),
        mode = ?config.mode,
        "quote_collector starting up"
    );

    let source = match config.fixed_item.clone() {
        Some(item) => {
            info!("Using the --text item; network fetch disabled");
            ItemSource::Fixed(item)
        }
        None => ItemSource::Http(build_fetcher(&config.fetch)?),
    };
    let collector = Collector::new(source, Store::new(&config.store_path));

    // Ctrl-C only matters between ticks of a repeating run
    let shutdown = Arc::new(Notify::new());
    if matches!(config.mode, RunMode::Repeat { .. }) {
        let signal = Arc::clone(&shutdown);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received interrupt; stopping after the current tick");
                    signal.notify_one();
                }
                Err(e) => warn!(error = %e, "Could not install interrupt handler"),
            }
        });
    }

    let summary = collector.run(&config.mode, &shutdown).await;

    let elapsed = start_time.elapsed();
    info!(
        ticks = summary.ticks,
        added = summary.added,
        duplicates = summary.duplicates,
        failures = summary.failures,
        path = %collector.store().path().display(),
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    if config.mode == RunMode::Once && summary.failures > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
