//! Runtime configuration handed to the pipeline.
//!
//! Everything the fetcher, store and loop need is carried in a
//! [`CollectorConfig`] built once by the CLI layer. Endpoint defaults live on
//! [`Profile`]; nothing below this module reads the environment.

use crate::fetcher::FieldMapping;
use crate::models::FetchedItem;
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Delay between attempts after a transport failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Named endpoint and field-mapping presets.
///
/// | Profile | Endpoint | Content fields | Source fields |
/// |---------|----------|----------------|---------------|
/// | `facts` | uselessfacts.jsph.pl | `text`, `fact` | `permalink`, `source_url` |
/// | `zenquotes` | zenquotes.io | `q`, `text`, `fact` | `a`, `permalink`, `source_url` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    Facts,
    Zenquotes,
}

impl Profile {
    pub fn default_url(self) -> &'static str {
        match self {
            Profile::Facts => "https://uselessfacts.jsph.pl/api/v2/facts/random?language=en",
            Profile::Zenquotes => "https://zenquotes.io/api/random",
        }
    }

    pub fn mapping(self) -> FieldMapping {
        match self {
            Profile::Facts => FieldMapping::default(),
            Profile::Zenquotes => FieldMapping::new(
                ["q", "text", "fact"],
                ["a", "permalink", "source_url"],
            ),
        }
    }
}

/// How to reach the endpoint and read its payload.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Skip TLS certificate verification. Local development only.
    pub accept_invalid_certs: bool,
    pub mapping: FieldMapping,
}

/// Single shot or a repeating loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Repeat {
        interval: Duration,
        /// `None` runs until interrupted.
        max_ticks: Option<u64>,
    },
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub fetch: FetchConfig,
    pub store_path: PathBuf,
    pub mode: RunMode,
    /// When set, every tick stores this item instead of calling the endpoint.
    pub fixed_item: Option<FetchedItem>,
}
