//! Data models for collected items.
//!
//! - [`FetchedItem`]: what the fetcher extracts from one API response
//! - [`Record`]: one persisted entry of the collection
//!
//! Records written by the earlier quote collector used the keys `quote` and
//! `author`; those are accepted as aliases on load and rewritten with the
//! current names on the next save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A text item extracted from an API payload, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedItem {
    /// The quote or fact, exactly as the endpoint returned it.
    pub text: String,
    /// Attribution URL or author, when the payload had one.
    pub source: Option<String>,
}

impl FetchedItem {
    pub fn new(text: impl Into<String>, source: Option<String>) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// One entry of the persisted collection.
///
/// Field order here is the field order on disk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Record {
    /// Raw text, including whatever whitespace the endpoint sent.
    #[serde(alias = "quote")]
    pub text: String,
    /// Attribution; written as `null` when absent.
    #[serde(alias = "author", default)]
    pub source: Option<String>,
    /// When the record was first added. Never changes afterwards.
    pub added_at: DateTime<Utc>,
}

impl Record {
    /// Stamp a fetched item with the current UTC time.
    pub fn stamped_now(text: impl Into<String>, source: Option<String>) -> Self {
        Self {
            text: text.into(),
            source,
            added_at: Utc::now(),
        }
    }
}
