//! Folders module.
//!
//! This module contains the representation of the email folders.

use std::ops;


use crate::Folder;

/// Represents the list of folders.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Folders(pub Vec<Folder>);

impl Folders {
    /// Returns the names of the selectable folders, in listing order.
    pub fn selectable_names(&self) -> Vec<String> {
        self.iter()
            .filter(|folder| folder.is_selectable())
            .map(|folder| folder.name.clone())
            .collect()
    }
}

impl ops::Deref for Folders {
    type Target = Vec<Folder>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Folder> for Folders {
    fn from_iter<T: IntoIterator<Item = Folder>>(iter: T) -> Self {
        Folders(iter.into_iter().collect())
    }
}
