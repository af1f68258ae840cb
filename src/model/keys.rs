// Package model provides indexed key records.

use serde::Serialize;
use std::fmt;

/// Value type of an indexed key, as reported by `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    String,
    List,
    Set,
    ZSet,
    Hash,
    Stream,
    /// The key expired or was deleted between listing and typing.
    None,
    Other,
}

impl KeyKind {
    /// Parses the reply of a `TYPE` command.
    pub fn from_type_reply(reply: &str) -> Self {
        match reply.trim().to_ascii_lowercase().as_str() {
            "string" => KeyKind::String,
            "list" => KeyKind::List,
            "set" => KeyKind::Set,
            "zset" => KeyKind::ZSet,
            "hash" => KeyKind::Hash,
            "stream" => KeyKind::Stream,
            "none" => KeyKind::None,
            _ => KeyKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::String => "string",
            KeyKind::List => "list",
            KeyKind::Set => "set",
            KeyKind::ZSet => "zset",
            KeyKind::Hash => "hash",
            KeyKind::Stream => "stream",
            KeyKind::None => "none",
            KeyKind::Other => "other",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single key found in a logical database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KeyRecord {
    pub key: String,
    pub kind: KeyKind,
}

impl KeyRecord {
    pub fn new(key: impl Into<String>, kind: KeyKind) -> Self {
        Self {
            key: key.into(),
            kind,
        }
    }

    /// Builds a record from a raw key as returned by the driver.
    /// Keys that are not valid UTF-8 are converted lossily.
    pub fn from_raw(raw: &[u8], kind: KeyKind) -> Self {
        Self {
            key: String::from_utf8_lossy(raw).into_owned(),
            kind,
        }
    }
}

/// Zips raw keys with their kinds into a list ordered by key.
/// Missing kinds (a short `TYPE` reply) are recorded as `KeyKind::Other`.
pub fn collect_sorted(raw_keys: &[Vec<u8>], kinds: &[KeyKind]) -> Vec<KeyRecord> {
    let mut records: Vec<KeyRecord> = raw_keys
        .iter()
        .enumerate()
        .map(|(i, raw)| KeyRecord::from_raw(raw, kinds.get(i).copied().unwrap_or(KeyKind::Other)))
        .collect();
    records.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    records.dedup_by(|a, b| a.key == b.key);
    records
}
