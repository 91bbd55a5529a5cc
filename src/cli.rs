//! Command-line interface definitions for the collector.
//!
//! Every option except the mode switch and the text override can also come
//! from a `COLLECTOR_*` environment variable.

use crate::config::{CollectorConfig, DEFAULT_RETRY_DELAY, FetchConfig, Profile, RunMode};
use crate::errors::ConfigError;
use crate::models::FetchedItem;
use crate::store::normalize_key;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Command-line arguments for the collector.
///
/// # Examples
///
/// ```sh
/// # One fact into ./collection.json
/// quote_collector
///
/// # A quote every ten minutes, at most 24 times
/// quote_collector --profile zenquotes --file quotes.json --repeat --interval 600 --max-ticks 24
///
/// # Exercise the dedup path without the network
/// quote_collector --text "Hello world" --source tests
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Endpoint preset (URL and field names)
    #[arg(long, value_enum, env = "COLLECTOR_PROFILE", default_value = "facts")]
    pub profile: Profile,

    /// Endpoint URL; defaults to the profile's endpoint
    #[arg(long, env = "COLLECTOR_URL")]
    pub url: Option<Url>,

    /// Request timeout in seconds
    #[arg(long, env = "COLLECTOR_TIMEOUT", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Total attempts per fetch, including the first
    #[arg(long, env = "COLLECTOR_ATTEMPTS", default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: u32,

    /// Collection file
    #[arg(short, long, env = "COLLECTOR_FILE", default_value = "collection.json")]
    pub file: PathBuf,

    /// Keep collecting at a fixed interval instead of running once
    #[arg(short, long)]
    pub repeat: bool,

    /// Seconds between ticks when repeating
    #[arg(long, env = "COLLECTOR_INTERVAL", default_value_t = 60)]
    pub interval: u64,

    /// Stop after this many ticks when repeating
    #[arg(long, env = "COLLECTOR_MAX_TICKS", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_ticks: Option<u64>,

    /// Skip TLS certificate verification (local development only)
    #[arg(long, env = "COLLECTOR_INSECURE")]
    pub insecure: bool,

    /// Store this text instead of fetching
    #[arg(long)]
    pub text: Option<String>,

    /// Attribution for --text
    #[arg(long, requires = "text")]
    pub source: Option<String>,
}

impl Cli {
    /// Resolve the parsed flags into the pipeline's configuration.
    pub fn into_config(self) -> Result<CollectorConfig, ConfigError> {
        let url = match self.url {
            Some(url) => url,
            None => Url::parse(self.profile.default_url())?,
        };

        if self.text.as_deref().is_some_and(|t| normalize_key(t).is_empty()) {
            return Err(ConfigError::BlankText);
        }

        let mode = if self.repeat {
            RunMode::Repeat {
                interval: Duration::from_secs(self.interval),
                max_ticks: self.max_ticks,
            }
        } else {
            RunMode::Once
        };

        Ok(CollectorConfig {
            fetch: FetchConfig {
                url,
                timeout: Duration::from_secs(self.timeout),
                max_attempts: self.attempts,
                retry_delay: DEFAULT_RETRY_DELAY,
                accept_invalid_certs: self.insecure,
                mapping: self.profile.mapping(),
            },
            store_path: self.file,
            mode,
            fixed_item: self.text.map(|text| FetchedItem::new(text, self.source)),
        })
    }
}
