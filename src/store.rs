//! Flat JSON store for the collected records.
//!
//! The whole collection lives in one JSON array on disk. Every save rewrites
//! the full file; there is no append log.
//!
//! # Recovery
//!
//! [`Store::load`] never fails. A missing file is a first run, and a file that
//! is unreadable, not JSON, or not an array is treated as a reset: the reason
//! is logged and an empty collection is returned. The next successful add
//! overwrites it.
//!
//! Inside a valid array, an element that does not read as a [`Record`] is
//! skipped by `load` but kept verbatim by [`Store::add_if_unique`]: its `text`
//! (or legacy `quote`) still counts for duplicate detection and the element is
//! written back in place on the next save.
//!
//! # Writes
//!
//! Saves go to a sibling `<name>.<pid>.tmp` file that is synced and then
//! renamed over the target, so an interrupted save leaves either the old or
//! the new collection.
//!
//! # Concurrency
//!
//! Nothing is locked. Two processes running [`Store::add_if_unique`] against
//! the same file can interleave their load and save, and the last writer wins:
//! the other append is lost. Temp files are per process, so the writers do not
//! trip over each other's rename.

use crate::errors::{CorruptStore, StoreError};
use crate::models::Record;
use crate::utils::{ensure_parent_dir, preview};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::collections::HashSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Reduce text to the key used for duplicate detection.
///
/// Leading and trailing whitespace is dropped and every internal run of
/// whitespace becomes a single space. Case and punctuation are kept, so
/// `"Hello world."` and `"hello world"` are different keys.
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One element of the on-disk array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum Entry {
    Record(Record),
    /// Did not read as a record; written back untouched.
    Unparsed(Value),
}

impl Entry {
    fn key(&self) -> Option<String> {
        match self {
            Entry::Record(r) => Some(normalize_key(&r.text)),
            Entry::Unparsed(v) => v
                .get("text")
                .or_else(|| v.get("quote"))
                .and_then(Value::as_str)
                .map(normalize_key),
        }
    }
}

/// The persisted collection at one file location.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the collection, falling back to empty when there is nothing usable.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> Vec<Record> {
        self.load_entries()
            .await
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Record(r) => Some(r),
                Entry::Unparsed(_) => None,
            })
            .collect()
    }

    async fn load_entries(&self) -> Vec<Entry> {
        match self.read().await {
            Ok(Some(entries)) => {
                debug!(count = entries.len(), "Loaded collection");
                entries
            }
            Ok(None) => {
                debug!("No collection on disk yet; starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Collection is unusable; starting empty");
                Vec::new()
            }
        }
    }

    async fn read(&self) -> Result<Option<Vec<Entry>>, CorruptStore> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CorruptStore::Unreadable(e)),
        };
        parse_collection(&bytes).map(Some)
    }

    /// Overwrite the file with `records`.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), count = records.len()))]
    pub async fn save(&self, records: &[Record]) -> Result<(), StoreError> {
        self.write(records).await
    }

    async fn write<T: Serialize>(&self, collection: &[T]) -> Result<(), StoreError> {
        let body = to_pretty_json(collection)?;
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        ensure_parent_dir(&self.path).await.map_err(write_err)?;
        write_atomically(&self.path, &body).await.map_err(write_err)?;
        debug!(bytes = body.len(), "Saved collection");
        Ok(())
    }

    /// Append `text` unless its normalized key is already in the collection.
    ///
    /// Returns `(true, record)` after the record was appended and the whole
    /// collection saved. Returns `(false, candidate)` for a duplicate; the
    /// candidate is not persisted and the file is not touched.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn add_if_unique(
        &self,
        text: &str,
        source: Option<&str>,
    ) -> Result<(bool, Record), StoreError> {
        let key = normalize_key(text);
        if key.is_empty() {
            return Err(StoreError::BlankText);
        }

        let mut entries = self.load_entries().await;
        let candidate = Record::stamped_now(text, source.map(str::to_string));

        let existing: HashSet<String> = entries.iter().filter_map(Entry::key).collect();
        if existing.contains(&key) {
            info!(text = %preview(&key, 80), count = entries.len(), "Duplicate; collection unchanged");
            return Ok((false, candidate));
        }

        entries.push(Entry::Record(candidate.clone()));
        self.write(&entries).await?;
        info!(text = %preview(&key, 80), count = entries.len(), "Added new record");
        Ok((true, candidate))
    }
}

fn parse_collection(bytes: &[u8]) -> Result<Vec<Entry>, CorruptStore> {
    let value: Value = serde_json::from_slice(bytes).map_err(CorruptStore::InvalidJson)?;
    let Value::Array(items) = value else {
        return Err(CorruptStore::NotAnArray);
    };
    let entries = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match Record::deserialize(&item) {
            Ok(record) => Entry::Record(record),
            Err(e) => {
                warn!(index, error = %e, "Element is not a record; keeping it as-is");
                Entry::Unparsed(item)
            }
        })
        .collect();
    Ok(entries)
}

fn to_pretty_json<T: Serialize>(collection: &[T]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    collection.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("collection"));
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

async fn write_atomically(path: &Path, body: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    let result: io::Result<()> = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(body).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> Store {
        Store::new(dir.path().join("collection.json"))
    }

    fn record(text: &str, source: Option<&str>, secs: i64) -> Record {
        Record {
            text: text.to_string(),
            source: source.map(str::to_string),
            added_at: Utc.timestamp_opt(1_746_540_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_normalize_key_trims_and_collapses() {
        assert_eq!(normalize_key("  Hello   world  "), "Hello world");
        assert_eq!(normalize_key("a\t\tb\n c"), "a b c");
        assert_eq!(normalize_key("   "), "");
    }

    #[test]
    fn test_normalize_key_keeps_case_and_punctuation() {
        assert_eq!(normalize_key("Hello World."), "Hello World.");
        assert_ne!(normalize_key("Hello world."), normalize_key("hello world"));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store_in(&dir).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let (first, _) = store.add_if_unique("Stay hungry.", Some("Jobs")).await.unwrap();
        let (second, _) = store.add_if_unique("Stay hungry.", Some("Jobs")).await.unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(store.load().await.len(), 1);
    }

    #[tokio::test]
    async fn test_whitespace_variants_are_duplicates() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let (first, stored) = store.add_if_unique("  Hello   world  ", Some("a")).await.unwrap();
        let (second, candidate) = store.add_if_unique("Hello world", Some("b")).await.unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(candidate.source.as_deref(), Some("b"));

        let records = store.load().await;
        assert_eq!(records.len(), 1);
        // stored raw, not normalized
        assert_eq!(records[0].text, "  Hello   world  ");
        assert_eq!(records[0], stored);
    }

    #[tokio::test]
    async fn test_case_and_punctuation_are_distinct() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let (first, _) = store.add_if_unique("Hello world.", None).await.unwrap();
        let (second, _) = store.add_if_unique("hello world", None).await.unwrap();

        assert!(first);
        assert!(second);
        assert_eq!(store.load().await.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add_if_unique("x", None).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        store.add_if_unique(" x ", Some("other")).await.unwrap();

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let result = store.add_if_unique(" \n\t ", None).await;

        assert!(matches!(result, Err(StoreError::BlankText)));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_invalid_json_recovers_and_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().await.is_empty());
        let (added, _) = store.add_if_unique("fresh start", None).await.unwrap();
        assert!(added);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_array_json_recovers() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"text": "not a list"}"#).unwrap();

        assert!(store.load().await.is_empty());
        store.add_if_unique("one", None).await.unwrap();
        assert_eq!(store.load().await.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_elements_do_not_discard_good_records() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"[
    {"text": "kept one", "source": null, "added_at": "2025-05-06T14:30:00Z"},
    {"text": "kept two", "source": null, "added_at": "2025-05-06T14:31:00Z"},
    {"text": "naive ts", "added_at": "2025-01-01T00:00:00.123456"},
    42
]"#,
        )
        .unwrap();

        let records = store.load().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "kept one");
        assert_eq!(records[1].text, "kept two");

        let (added_existing, _) = store.add_if_unique("kept one", None).await.unwrap();
        assert!(!added_existing);
        let (added_unparsed, _) = store.add_if_unique("naive  ts", None).await.unwrap();
        assert!(!added_unparsed);

        let (added, _) = store.add_if_unique("brand new", None).await.unwrap();
        assert!(added);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[2]["added_at"], "2025-01-01T00:00:00.123456");
        assert_eq!(items[3], 42);
        assert_eq!(items[4]["text"], "brand new");
        assert_eq!(store.load().await.len(), 3);
    }

    #[test]
    fn test_temp_path_is_per_process() {
        let tmp = temp_path(Path::new("/data/collection.json"));
        assert_eq!(
            tmp,
            PathBuf::from(format!("/data/collection.json.{}.tmp", std::process::id()))
        );
    }

    #[tokio::test]
    async fn test_non_utf8_file_recovers() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), [0xff, 0xfe, 0x00]).unwrap();

        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let records = vec![
            record("first", Some("https://example.com/1"), 0),
            record("  second  ", None, 60),
            record("Ünïcödé — «quote»", Some("Anon"), 120),
        ];

        store.save(&records).await.unwrap();

        assert_eq!(store.load().await, records);
    }

    #[tokio::test]
    async fn test_save_format_is_indented_and_keeps_unicode() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&[record("Ça va — 你好", None, 0)])
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("Ça va — 你好"));
        assert!(!raw.contains("\\u"));
        assert!(raw.contains("\n        \"text\": "));
        assert!(raw.contains("\"source\": null"));

        let text_at = raw.find("\"text\"").unwrap();
        let source_at = raw.find("\"source\"").unwrap();
        let added_at = raw.find("\"added_at\"").unwrap();
        assert!(text_at < source_at && source_at < added_at);
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("nested").join("collection.json"));

        store.save(&[record("x", None, 0)]).await.unwrap();

        assert!(store.path().exists());
        assert!(!temp_path(store.path()).exists());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "a file, not a directory").unwrap();
        let store = Store::new(blocker.join("collection.json"));

        let result = store.add_if_unique("will not persist", None).await;

        assert!(matches!(result, Err(StoreError::Write { .. })));
    }

    #[tokio::test]
    async fn test_legacy_quote_file_is_loaded_and_rewritten() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"[
    {
        "quote": "Well begun is half done.",
        "author": "Aristotle",
        "added_at": "2025-05-06T14:30:00.123456+00:00"
    }
]"#,
        )
        .unwrap();

        let (added_again, _) = store
            .add_if_unique("Well begun is  half done.", None)
            .await
            .unwrap();
        assert!(!added_again);

        let (added, _) = store.add_if_unique("Another one.", None).await.unwrap();
        assert!(added);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("\"quote\""));
        assert!(raw.contains("\"source\": \"Aristotle\""));
    }

    /// No locking: interleaved load→save sequences from two writers lose an
    /// append. This documents the race rather than guarding against it.
    #[tokio::test]
    async fn test_interleaved_writers_lose_an_update() {
        let dir = TempDir::new().unwrap();
        let a = store_in(&dir);
        let b = store_in(&dir);

        let mut seen_by_a = a.load().await;
        let mut seen_by_b = b.load().await;

        seen_by_a.push(record("from a", None, 0));
        seen_by_b.push(record("from b", None, 1));
        a.save(&seen_by_a).await.unwrap();
        b.save(&seen_by_b).await.unwrap();

        let records = a.load().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "from b");
    }
}
