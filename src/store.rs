//! # Telemetry table
//!
//! The name → entry table shared between the poll loop (the only writer) and
//! any number of readers. All access goes through one mutex; the table is
//! small enough that a linear scan by name beats any index.
//!
//! `last_changed` moves only when the content actually changes, so a reader
//! can tell "the meter reported something new" apart from "we polled again".

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use log::{error, trace};
use serde::Serialize;

use crate::error::{Result, TicError};
use crate::tic::{BoundedString, LABEL_LEN_MAX, MESSAGE_COUNT_MAX, VALUE_LEN_MAX};

/// Suffix of the entry holding a label's datetime field.
pub const DATETIME_SUFFIX: &str = ".datetime";

/// Name of the synthetic connectivity entry.
pub const STATUS_NAME: &str = "status";

/// One entry per label, one datetime twin per label, plus `status`.
pub const STORE_CAPACITY: usize = MESSAGE_COUNT_MAX * 2 + 1;

pub const NAME_LEN_MAX: usize = LABEL_LEN_MAX + DATETIME_SUFFIX.len();
pub const CONTENT_LEN_MAX: usize = VALUE_LEN_MAX;

pub type EntryName = BoundedString<NAME_LEN_MAX>;
pub type EntryContent = BoundedString<CONTENT_LEN_MAX>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEntry {
    pub name: EntryName,
    pub content: EntryContent,
    pub last_changed: DateTime<Utc>,
}

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Changed,
    Unchanged,
}

/// Cloneable handle to the shared table.
#[derive(Debug, Clone, Default)]
pub struct TelemetryStore {
    entries: Arc<Mutex<Vec<TelemetryEntry>>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates one entry.
    pub fn upsert(&self, name: &str, content: &str, now: DateTime<Utc>) -> Result<Upsert> {
        let mut entries = self.lock();
        upsert_locked(&mut entries, name, content, now)
    }

    /// Applies a whole batch under one lock so readers never see half of it.
    ///
    /// A failing pair is logged and skipped; the rest of the batch still
    /// applies. Returns how many entries were inserted or changed.
    pub fn apply<'a, I>(&self, batch: I, now: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut entries = self.lock();
        let mut touched = 0;
        for (name, content) in batch {
            match upsert_locked(&mut entries, name, content, now) {
                Ok(Upsert::Unchanged) => {}
                Ok(_) => touched += 1,
                Err(e) => error!("dropping update of {}: {}", name, e),
            }
        }
        touched
    }

    /// Content and last-change time of `name`.
    pub fn get(&self, name: &str) -> Option<(String, DateTime<Utc>)> {
        self.lock()
            .iter()
            .find(|e| e.name.as_str() == name)
            .map(|e| (e.content.to_string(), e.last_changed))
    }

    /// Names in insertion order.
    pub fn list_names(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.name.to_string()).collect()
    }

    /// Copy of every entry in insertion order.
    pub fn snapshot(&self) -> Vec<TelemetryEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TelemetryEntry>> {
        // Every mutation completes before it can panic, so a poisoned table
        // is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn upsert_locked(
    entries: &mut Vec<TelemetryEntry>,
    name: &str,
    content: &str,
    now: DateTime<Utc>,
) -> Result<Upsert> {
    let capacity = |e: crate::error::CapacityError| TicError::CapacityExceeded {
        capacity: e.capacity,
    };

    if let Some(entry) = entries.iter_mut().find(|e| e.name.as_str() == name) {
        if entry.content.as_str() == content {
            return Ok(Upsert::Unchanged);
        }
        entry.content.set(content).map_err(capacity)?;
        entry.last_changed = entry.last_changed.max(now);
        trace!("{} changed to {:?}", name, content);
        return Ok(Upsert::Changed);
    }

    if entries.len() >= STORE_CAPACITY {
        return Err(TicError::CapacityExceeded {
            capacity: STORE_CAPACITY,
        });
    }
    entries.push(TelemetryEntry {
        name: EntryName::try_from(name).map_err(capacity)?,
        content: EntryContent::try_from(content).map_err(capacity)?,
        last_changed: now,
    });
    trace!("{} created as {:?}", name, content);
    Ok(Upsert::Inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn first_upsert_inserts_with_now() {
        let store = TelemetryStore::new();
        assert_eq!(store.upsert("PAPP", "00420", t(0)).unwrap(), Upsert::Inserted);
        assert_eq!(store.get("PAPP"), Some(("00420".to_string(), t(0))));
    }

    #[test]
    fn identical_content_keeps_the_timestamp() {
        let store = TelemetryStore::new();
        store.upsert("PAPP", "00420", t(0)).unwrap();
        assert_eq!(store.upsert("PAPP", "00420", t(10)).unwrap(), Upsert::Unchanged);
        assert_eq!(store.get("PAPP").unwrap().1, t(0));
    }

    #[test]
    fn changed_content_moves_the_timestamp() {
        let store = TelemetryStore::new();
        store.upsert("PAPP", "00420", t(0)).unwrap();
        assert_eq!(store.upsert("PAPP", "00510", t(10)).unwrap(), Upsert::Changed);
        assert_eq!(store.get("PAPP"), Some(("00510".to_string(), t(10))));
    }

    #[test]
    fn timestamp_never_goes_backward() {
        let store = TelemetryStore::new();
        store.upsert("PAPP", "1", t(10)).unwrap();
        store.upsert("PAPP", "2", t(10) - Duration::seconds(5)).unwrap();
        assert_eq!(store.get("PAPP"), Some(("2".to_string(), t(10))));
    }

    #[test]
    fn names_keep_insertion_order_without_duplicates() {
        let store = TelemetryStore::new();
        for name in ["status", "ADCO", "PAPP", "ADCO"] {
            store.upsert(name, "x", t(0)).unwrap();
        }
        assert_eq!(store.list_names(), ["status", "ADCO", "PAPP"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let store = TelemetryStore::new();
        assert!(store.get("nope").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn full_table_refuses_new_names_but_updates_old_ones() {
        let store = TelemetryStore::new();
        for i in 0..STORE_CAPACITY {
            store.upsert(&format!("L{}", i), "0", t(0)).unwrap();
        }
        assert!(matches!(
            store.upsert("EXTRA", "0", t(1)),
            Err(TicError::CapacityExceeded { capacity: STORE_CAPACITY })
        ));
        assert_eq!(store.upsert("L0", "1", t(1)).unwrap(), Upsert::Changed);
        assert_eq!(store.len(), STORE_CAPACITY);
    }

    #[test]
    fn oversized_content_is_refused_and_old_content_kept() {
        let store = TelemetryStore::new();
        store.upsert("MSG1", "short", t(0)).unwrap();
        let long = "x".repeat(CONTENT_LEN_MAX + 1);
        assert!(store.upsert("MSG1", &long, t(1)).is_err());
        assert_eq!(store.get("MSG1"), Some(("short".to_string(), t(0))));
    }

    #[test]
    fn apply_skips_bad_pairs_and_counts_changes() {
        let store = TelemetryStore::new();
        store.upsert("A", "1", t(0)).unwrap();
        let long_name = "N".repeat(NAME_LEN_MAX + 1);
        let touched = store.apply(
            [("A", "1"), ("B", "2"), (long_name.as_str(), "3"), ("A", "4")],
            t(5),
        );
        assert_eq!(touched, 2);
        assert_eq!(store.list_names(), ["A", "B"]);
        assert_eq!(store.get("A"), Some(("4".to_string(), t(5))));
    }

    #[test]
    fn clones_share_the_same_table() {
        let writer = TelemetryStore::new();
        let reader = writer.clone();
        writer.upsert("ADCO", "1", t(0)).unwrap();
        assert_eq!(reader.list_names(), ["ADCO"]);
    }
}
