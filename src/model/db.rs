// Package model provides the logical database index type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Number of logical databases every backing store exposes.
pub const DB_COUNT: u8 = 16;

/// Logical database index, always within `0..DB_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DbIndex(u8);

impl DbIndex {
    /// Validates a raw index.
    pub fn new(index: u32) -> Result<Self, Error> {
        if index < DB_COUNT as u32 {
            Ok(Self(index as u8))
        } else {
            Err(Error::InvalidDatabase(index))
        }
    }

    /// Iterates every logical database in ascending order.
    pub fn all() -> impl Iterator<Item = DbIndex> {
        (0..DB_COUNT).map(DbIndex)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u32> for DbIndex {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DbIndex> for u32 {
    fn from(value: DbIndex) -> Self {
        value.0 as u32
    }
}

impl fmt::Display for DbIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "db{}", self.0)
    }
}
