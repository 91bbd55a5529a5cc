//! Test doubles shared by the unit tests.

use crate::errors::FetchError;
use crate::fetcher::ItemFetcher;
use crate::models::FetchedItem;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Fetcher that replays a fixed script and counts calls.
///
/// Once the script runs out, every call returns `fallback()`.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<FetchedItem, FetchError>>>,
    fallback: fn() -> FetchError,
    calls: AtomicU32,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<FetchedItem, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: || FetchError::Transport("script exhausted".into()),
            calls: AtomicU32::new(0),
        }
    }

    /// Fails every call with the same error.
    pub fn always(error: fn() -> FetchError) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: error,
            calls: AtomicU32::new(0),
        }
    }

    /// Returns the given texts in order, without sources.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| Ok(FetchedItem::new(*t, None)))
                .collect(),
        )
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ItemFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<FetchedItem, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err((self.fallback)()))
    }
}
