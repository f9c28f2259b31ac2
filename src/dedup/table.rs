//! Identity table module.
//!
//! This module contains the table of the identities seen during a run,
//! and the set of identities forced as duplicates.

use log::debug;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::Path,
};

use super::{lists, Result};
use crate::Identity;

/// Represents the canonical location of an identity: where it was
/// first seen.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Location {
    Seen { folder: String, seq: u32 },
    /// The identity comes from the forced duplicates.
    Forced,
}

impl Location {
    pub fn seen<F: ToString>(folder: F, seq: u32) -> Self {
        Self::Seen {
            folder: folder.to_string(),
            seq,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Location::Seen { folder, seq } => write!(f, "{}:{}", folder, seq),
            Location::Forced => write!(f, "a forced duplicate"),
        }
    }
}

/// Represents identities treated as already seen, even before their
/// first occurrence.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ForcedDuplicates(HashSet<Identity>);

impl ForcedDuplicates {
    /// Loads the forced duplicates from an identity list.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let forced = Self::from_iter(lists::read_identities(path.as_ref())?);
        debug!(
            "loaded {} forced duplicate(s) from {:?}",
            forced.len(),
            path.as_ref()
        );
        Ok(forced)
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Identity> for ForcedDuplicates {
    fn from_iter<T: IntoIterator<Item = Identity>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Maps every identity seen during a run to its canonical location.
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    entries: HashMap<Identity, Location>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records an occurrence of the identity. Returns the canonical
    /// location when the occurrence is a duplicate, `None` when it
    /// becomes the canonical location itself.
    pub fn record(
        &mut self,
        id: &Identity,
        location: Location,
        forced: Option<&ForcedDuplicates>,
    ) -> Option<Location> {
        if let Some(canonical) = self.entries.get(id) {
            return Some(canonical.clone());
        }

        if forced.map_or(false, |forced| forced.contains(id)) {
            self.entries.insert(id.clone(), Location::Forced);
            return Some(Location::Forced);
        }

        self.entries.insert(id.clone(), location);
        None
    }
}
