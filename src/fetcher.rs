//! Fetching one item from a JSON endpoint.
//!
//! # Architecture
//!
//! - [`ItemFetcher`]: core trait, one call yields one [`FetchedItem`]
//! - [`HttpFetcher`]: a single GET with reqwest, decoded through a [`FieldMapping`]
//! - [`RetryFetch`]: decorator that retries transport failures with a fixed delay
//!
//! # Retry Strategy
//!
//! Only [`FetchError::Transport`] is retried. A non-2xx status, an undecodable
//! body, or a payload without content fails on the first attempt.

use crate::config::FetchConfig;
use crate::errors::FetchError;
use crate::models::FetchedItem;
use crate::store::normalize_key;
use crate::utils::preview;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Sent with every request.
pub const USER_AGENT: &str = concat!("quote_collector/", env!("CARGO_PKG_VERSION"));

/// Something that can produce one item per call.
pub trait ItemFetcher {
    async fn fetch(&self) -> Result<FetchedItem, FetchError>;
}

/// Which payload keys hold the content and the attribution.
///
/// Each list is searched in order and the first key present wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub content_fields: Vec<String>,
    pub source_fields: Vec<String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::new(["text", "fact"], ["permalink", "source_url"])
    }
}

impl FieldMapping {
    pub fn new<C, S>(content: C, source: S) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            content_fields: content.into_iter().map(Into::into).collect(),
            source_fields: source.into_iter().map(Into::into).collect(),
        }
    }

    /// Pull `(text, source)` out of a decoded payload.
    ///
    /// A top-level array is unwrapped to its first element. Content must be a
    /// string that is not blank; a source that is absent or not a string is
    /// `None`.
    pub fn extract(&self, payload: &Value) -> Result<FetchedItem, FetchError> {
        let object = match payload {
            Value::Array(items) => items.first(),
            other => Some(other),
        };

        let missing = || FetchError::MissingField {
            fields: self.content_fields.clone(),
        };
        let object = object.ok_or_else(missing)?;

        let text = first_present(object, &self.content_fields)
            .and_then(Value::as_str)
            .filter(|t| !normalize_key(t).is_empty())
            .ok_or_else(missing)?;

        let source = first_present(object, &self.source_fields)
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(FetchedItem::new(text, source))
    }
}

/// First key of `keys` present on `object`, even if its value is `null`.
fn first_present<'a>(object: &'a Value, keys: &[String]) -> Option<&'a Value> {
    keys.iter().find_map(|k| object.get(k.as_str()))
}

/// One GET against the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    url: Url,
    mapping: FieldMapping,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        if config.accept_invalid_certs {
            warn!(url = %config.url, "TLS certificate verification is DISABLED; use for local development only");
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            mapping: config.mapping.clone(),
        })
    }
}

impl ItemFetcher for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<FetchedItem, FetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: self.url.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read response body: {e}")))?;
        let body = std::str::from_utf8(&bytes)
            .map_err(|e| FetchError::Decode(format!("body is not UTF-8: {e}")))?;
        debug!(bytes = bytes.len(), body = %preview(body, 200), "Received response");

        let payload: Value =
            serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
        self.mapping.extract(&payload)
    }
}

/// Retries the wrapped fetcher on transport failures.
///
/// At most `max_attempts` calls are made in total, with `delay` between them.
pub struct RetryFetch<T> {
    inner: T,
    max_attempts: u32,
    delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: ItemFetcher,
{
    /// A `max_attempts` of 0 is treated as 1.
    pub fn new(inner: T, max_attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish()
    }
}

impl<T> ItemFetcher for RetryFetch<T>
where
    T: ItemFetcher,
{
    #[instrument(level = "info", skip_all, fields(max_attempts = self.max_attempts))]
    async fn fetch(&self) -> Result<FetchedItem, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.inner.fetch().await {
                Ok(item) => {
                    if attempt > 1 {
                        info!(attempt, "Fetch succeeded after retrying");
                    }
                    return Ok(item);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay = ?self.delay,
                        error = %e,
                        "Fetch attempt failed; retrying"
                    );
                    sleep(self.delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!(
                            attempt,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            error = %e,
                            "Fetch exhausted retries"
                        );
                    } else {
                        warn!(attempt, error = %e, "Fetch failed; not retrying");
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Build the retrying HTTP fetcher described by `config`.
pub fn build_fetcher(config: &FetchConfig) -> Result<RetryFetch<HttpFetcher>, reqwest::Error> {
    let http = HttpFetcher::new(config)?;
    Ok(RetryFetch::new(http, config.max_attempts, config.retry_delay))
}
