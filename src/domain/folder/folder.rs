//! Folder module.
//!
//! This module contains the representation of the email folder, as
//! returned by a folder listing: `(attributes) "delimiter" name`.

use std::fmt;

/// Represents the folder.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Represents the folder hierarchy delimiter. `None` means the
    /// server reported no delimiter (flat hierarchy).
    pub delim: Option<String>,
    /// Represents the folder name.
    pub name: String,
    /// Represents the folder attributes, as reported by the server.
    pub attributes: Vec<String>,
}

impl Folder {
    pub fn new<N: ToString>(name: N) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Returns `false` when the folder cannot be selected (it only
    /// exists as a node of the hierarchy).
    pub fn is_selectable(&self) -> bool {
        !self.attributes.iter().any(|attr| {
            let attr = attr.to_lowercase();
            attr.contains("noselect") || attr.contains("nonexistent")
        })
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
