use std::fmt;

/// Represents the flag variants the deduplication can set.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub enum Flag {
    Deleted,
    Custom(String),
}

impl Flag {
    pub fn custom<F: ToString>(flag: F) -> Self {
        Self::Custom(flag.to_string())
    }

    /// Builds the IMAP representation of the flag: system flags get
    /// their backslash prefix, custom flags are sent as keywords.
    pub fn to_imap_query(&self) -> String {
        match self {
            Flag::Deleted => String::from("\\Deleted"),
            Flag::Custom(flag) => flag.clone(),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Flag::Deleted => write!(f, "deleted"),
            Flag::Custom(flag) => write!(f, "{}", flag),
        }
    }
}
