use std::{collections::HashSet, fmt, ops};

use crate::Flag;

/// Represents the list of flags.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Flags(pub HashSet<Flag>);

impl Flags {
    /// Builds the IMAP query of the flags, space-separated and sorted
    /// so that the same set always renders the same way.
    pub fn to_imap_query(&self) -> String {
        let mut flags: Vec<String> = self.iter().map(Flag::to_imap_query).collect();
        flags.sort();
        flags.join(" ")
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut flags: Vec<String> = self.iter().map(Flag::to_string).collect();
        flags.sort();
        write!(f, "{}", flags.join(" "))
    }
}

impl ops::Deref for Flags {
    type Target = HashSet<Flag>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        Flags(iter.into_iter().collect())
    }
}
