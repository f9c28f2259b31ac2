//! Dedup module.
//!
//! This module contains the duplicate detection and resolution of a
//! single account: folders are scanned in order against one identity
//! table, then the duplicates of each folder are acted upon.

pub mod hierarchy;
pub mod lists;
pub mod resolver;
pub mod run;
pub mod scanner;
pub mod table;

pub use hierarchy::expand;
pub use resolver::{resolve, Resolution};
pub use run::{run, FolderReport, RunReport};
pub use scanner::{Duplicate, FolderScan, Scanner};
pub use table::{ForcedDuplicates, IdentityTable, Location};

use chrono::NaiveDate;
use log::debug;
use std::{io, path::PathBuf, result};
use thiserror::Error;

use crate::{
    backend::{self, Backend, Criterion, SearchQuery},
    config,
    domain::email,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read identity list {1:?}")]
    ReadIdentitiesError(#[source] io::Error, PathBuf),
    #[error("cannot write identity list {1:?}")]
    WriteIdentitiesError(#[source] io::Error, PathBuf),
    #[error("cannot read mailbox list {1:?}")]
    ReadMailboxListError(#[source] io::Error, PathBuf),
    #[error("cannot parse mailbox list {1:?}")]
    ParseMailboxListError(#[source] serde_json::Error, PathBuf),
    #[error("cannot write mailbox list {1:?}")]
    WriteMailboxListError(#[source] io::Error, PathBuf),
    #[error("cannot serialize mailbox list")]
    SerializeMailboxListError(#[source] serde_json::Error),
    #[error("cannot copy duplicates of {1} to {2}, remaining batches aborted")]
    CopyDuplicatesError(#[source] backend::Error, String, String),

    #[error(transparent)]
    ConfigError(#[from] config::Error),
    #[error(transparent)]
    EmailError(#[from] email::Error),
    #[error(transparent)]
    BackendError(#[from] backend::Error),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the message counts of the selected folder.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Counts {
    pub deleted: usize,
    pub undeleted: usize,
    /// Only counted when duplicates are tagged.
    pub tagged: Option<usize>,
}

/// Counts the deleted, undeleted and optionally tagged messages of the
/// selected folder.
pub fn count<B: Backend + ?Sized>(
    backend: &mut B,
    sent_before: Option<NaiveDate>,
    tag: Option<&str>,
) -> Result<Counts> {
    let deleted = backend
        .search(&SearchQuery::new(Criterion::Deleted, sent_before))?
        .len();
    let undeleted = backend
        .search(&SearchQuery::new(Criterion::Undeleted, sent_before))?
        .len();
    let tagged = match tag {
        Some(tag) => Some(
            backend
                .search(&SearchQuery::new(Criterion::Keyword(tag.to_owned()), sent_before))?
                .len(),
        ),
        None => None,
    };

    let counts = Counts {
        deleted,
        undeleted,
        tagged,
    };
    debug!("counts: {:?}", counts);
    Ok(counts)
}
