// Package db provides the key cache store.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::glob::glob_to_regex;
use crate::model::{DbIndex, KeyRecord};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    server: String,
    db: DbIndex,
}

impl EntryKey {
    fn new(server: &str, db: DbIndex) -> Self {
        Self {
            server: server.to_string(),
            db,
        }
    }
}

/// Result of one enumeration, shared by every reader holding it.
struct Snapshot {
    keys: Arc<[KeyRecord]>,
    loaded_at: DateTime<Utc>,
}

/// What the cache knows about one `(server, db)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    NotLoaded,
    LoadedEmpty,
    Loaded(Arc<[KeyRecord]>),
}

/// Totals across every entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries with at least one key.
    pub entries: usize,
    /// Entries whose last enumeration found nothing.
    pub empty: usize,
    pub keys: usize,
}

/// Key index keyed by `(server, db)`.
///
/// Each entry is an `ArcSwap` slot: `put` builds the new list off to the side
/// and swaps it in, so readers get either the previous full list or the new
/// one and never wait on a writer. Entries are independent of each other.
pub struct KeyCache {
    entries: DashMap<EntryKey, Arc<ArcSwap<Snapshot>>>,
    empty: Arc<[KeyRecord]>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            empty: Arc::from(Vec::<KeyRecord>::new()),
        }
    }

    /// Replaces the entry for `(server, db)` with `keys`.
    pub fn put(&self, server: &str, db: DbIndex, keys: Vec<KeyRecord>) {
        let snapshot = Arc::new(Snapshot {
            keys: Arc::from(keys),
            loaded_at: Utc::now(),
        });
        let key = EntryKey::new(server, db);

        if let Some(slot) = self.entries.get(&key) {
            slot.store(snapshot);
            return;
        }
        match self.entries.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(slot) => slot.get().store(snapshot),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(ArcSwap::new(snapshot)));
            }
        }
    }

    /// Keys of `(server, db)` ordered by name; empty when the entry is
    /// missing or the database had no keys. See `state` to tell them apart.
    pub fn get(&self, server: &str, db: DbIndex) -> Arc<[KeyRecord]> {
        self.snapshot(server, db)
            .map(|s| s.keys.clone())
            .unwrap_or_else(|| self.empty.clone())
    }

    pub fn state(&self, server: &str, db: DbIndex) -> EntryState {
        match self.snapshot(server, db) {
            None => EntryState::NotLoaded,
            Some(s) if s.keys.is_empty() => EntryState::LoadedEmpty,
            Some(s) => EntryState::Loaded(s.keys.clone()),
        }
    }

    /// When the entry was last written.
    pub fn loaded_at(&self, server: &str, db: DbIndex) -> Option<DateTime<Utc>> {
        self.snapshot(server, db).map(|s| s.loaded_at)
    }

    /// Keys of `(server, db)` matching a Redis-style glob pattern.
    pub fn search(&self, server: &str, db: DbIndex, pattern: &str) -> Result<Vec<KeyRecord>, regex::Error> {
        let re = glob_to_regex(pattern)?;
        Ok(self
            .get(server, db)
            .iter()
            .filter(|r| re.is_match(&r.key))
            .cloned()
            .collect())
    }

    /// Loaded databases of a server with their key counts, by index.
    pub fn databases(&self, server: &str) -> Vec<(DbIndex, usize)> {
        let mut dbs: Vec<(DbIndex, usize)> = self
            .entries
            .iter()
            .filter(|e| e.key().server == server)
            .map(|e| (e.key().db, e.value().load().keys.len()))
            .collect();
        dbs.sort_unstable_by_key(|(db, _)| *db);
        dbs
    }

    pub fn stats(&self) -> CacheStats {
        self.entries
            .iter()
            .fold(CacheStats::default(), |mut acc, e| {
                let n = e.value().load().keys.len();
                if n == 0 {
                    acc.empty += 1;
                } else {
                    acc.entries += 1;
                    acc.keys += n;
                }
                acc
            })
    }

    fn snapshot(&self, server: &str, db: DbIndex) -> Option<Arc<Snapshot>> {
        // Clone the slot out so the shard lock is not held while loading.
        let slot = self.entries.get(&EntryKey::new(server, db))?.value().clone();
        let snapshot = slot.load_full();
        Some(snapshot)
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}
