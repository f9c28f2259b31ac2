// imap-dedup, a Rust tool for finding duplicate emails over IMAP.
// Copyright (C) 2022  soywod <clement.douin@posteo.net>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Config module.
//!
//! This module contains the options of a deduplication run, and their
//! validation. Everything here is checked before any connection is
//! attempted.

use chrono::NaiveDate;
use std::{env, path::PathBuf, result};
use thiserror::Error;

use crate::{Flag, Flags, IdentityMode};

pub const DEFAULT_FETCH_BATCH_SIZE: usize = 100;
pub const DEFAULT_ACTION_BATCH_SIZE: usize = 30;

/// Format of the sent-before date, for example `1-Feb-2020`.
pub const SENT_BEFORE_FMT: &str = "%d-%b-%Y";

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot connect: a server and a user, or a process command, are required")]
    MissingServerError,
    #[error("cannot recurse from more than one mailbox")]
    RecursiveManyMailboxesError,
    #[error("cannot include the message id in the checksum without checksum mode")]
    ChecksumWithIdWithoutChecksumError,
    #[error("cannot find duplicates: no mailbox given")]
    MissingMailboxError,
    #[error("cannot use a batch size of 0")]
    ZeroBatchSizeError,
    #[error("cannot parse sent-before date {1}, expected a date like 1-Feb-2020")]
    ParseSentBeforeError(#[source] chrono::ParseError, String),
    #[error("cannot expand path {1}")]
    ExpandPathError(#[source] shellexpand::LookupError<env::VarError>, String),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the mark applied to duplicates.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum Mark {
    #[default]
    Deleted,
    Tag(String),
}

impl Mark {
    pub fn to_flags(&self) -> Flags {
        match self {
            Mark::Deleted => Flags::from_iter([Flag::Deleted]),
            Mark::Tag(tag) => Flags::from_iter([Flag::custom(tag)]),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Mark::Deleted => None,
            Mark::Tag(tag) => Some(tag),
        }
    }

    /// Describes the mark for log lines, like `marked as deleted`.
    pub fn describe(&self) -> String {
        match self {
            Mark::Deleted => String::from("marked as deleted"),
            Mark::Tag(tag) => format!("tagged as '{}'", tag),
        }
    }
}

/// Represents what happens to the duplicates of a folder.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Action {
    pub mark: Mark,
    /// Folder the duplicates are copied to before being marked.
    pub copy_to: Option<String>,
    pub dry_run: bool,
    pub batch_size: usize,
}

impl Default for Action {
    fn default() -> Self {
        Self {
            mark: Mark::default(),
            copy_to: None,
            dry_run: false,
            batch_size: DEFAULT_ACTION_BATCH_SIZE,
        }
    }
}

/// Represents the options of a deduplication run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DedupConfig {
    /// Mailboxes to process, in order.
    pub mailboxes: Vec<String>,
    pub identity_mode: IdentityMode,
    pub dry_run: bool,
    pub verbose: bool,
    pub show: bool,
    /// Adds the descendants of the single given mailbox.
    pub recursive: bool,
    pub reverse: bool,
    pub sent_before: Option<NaiveDate>,
    pub mark: Mark,
    pub copy_to: Option<String>,
    /// Only lists the selectable mailboxes.
    pub list_only: bool,
    pub save_list: Option<PathBuf>,
    pub save_ids: Option<PathBuf>,
    pub save_export: Option<PathBuf>,
    /// File of identities flagged on their first occurrence.
    pub forced_ids: Option<PathBuf>,
    /// Leaves the last folder selected, some servers purge deleted
    /// messages on close.
    pub no_close: bool,
    pub fetch_batch_size: usize,
    pub action_batch_size: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            mailboxes: Vec::new(),
            identity_mode: IdentityMode::default(),
            dry_run: false,
            verbose: false,
            show: false,
            recursive: false,
            reverse: false,
            sent_before: None,
            mark: Mark::default(),
            copy_to: None,
            list_only: false,
            save_list: None,
            save_ids: None,
            save_export: None,
            forced_ids: None,
            no_close: false,
            fetch_batch_size: DEFAULT_FETCH_BATCH_SIZE,
            action_batch_size: DEFAULT_ACTION_BATCH_SIZE,
        }
    }
}

impl DedupConfig {
    /// Checks the combinations of options.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_batch_size == 0 || self.action_batch_size == 0 {
            return Err(Error::ZeroBatchSizeError);
        }

        if self.lists_folders() {
            return Ok(());
        }

        match self.mailboxes.len() {
            0 => Err(Error::MissingMailboxError),
            1 => Ok(()),
            _ if self.recursive => Err(Error::RecursiveManyMailboxesError),
            _ => Ok(()),
        }
    }

    /// Returns `true` when the run only lists folders.
    pub fn lists_folders(&self) -> bool {
        self.list_only || self.save_list.is_some()
    }

    /// Returns `true` when the run collects identities or messages
    /// instead of acting on duplicates.
    pub fn collects_only(&self) -> bool {
        self.save_ids.is_some() || self.save_export.is_some()
    }

    pub fn action(&self) -> Action {
        Action {
            mark: self.mark.clone(),
            copy_to: self.copy_to.clone(),
            dry_run: self.dry_run,
            batch_size: self.action_batch_size,
        }
    }
}

/// Parses a sent-before date, like `1-Feb-2020`.
pub fn parse_sent_before(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), SENT_BEFORE_FMT)
        .map_err(|err| Error::ParseSentBeforeError(err, date.to_owned()))
}

/// Expands `~` and environment variables of a path.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let path = shellexpand::full(path).map_err(|err| Error::ExpandPathError(err, path.to_owned()))?;
    Ok(PathBuf::from(path.as_ref()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{parse_sent_before, DedupConfig, Error, Mark};

    #[test]
    fn parse_date() {
        assert_eq!(
            NaiveDate::from_ymd_opt(2020, 2, 1),
            parse_sent_before("1-Feb-2020").ok()
        );
        assert_eq!(
            NaiveDate::from_ymd_opt(2021, 12, 24),
            parse_sent_before("24-dec-2021").ok()
        );
        assert!(parse_sent_before("2020-02-01").is_err());
    }

    #[test]
    fn validate() {
        let config = DedupConfig::default();
        assert!(matches!(config.validate(), Err(Error::MissingMailboxError)));

        let config = DedupConfig {
            list_only: true,
            ..DedupConfig::default()
        };
        assert!(config.validate().is_ok());

        let config = DedupConfig {
            mailboxes: vec!["INBOX".into(), "Archive".into()],
            recursive: true,
            ..DedupConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::RecursiveManyMailboxesError)
        ));

        let config = DedupConfig {
            mailboxes: vec!["INBOX".into()],
            action_batch_size: 0,
            ..DedupConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::ZeroBatchSizeError)));
    }

    #[test]
    fn mark() {
        assert_eq!("\\Deleted", Mark::Deleted.to_flags().to_imap_query());
        assert_eq!("dup", Mark::Tag("dup".into()).to_flags().to_imap_query());
        assert_eq!("tagged as 'dup'", Mark::Tag("dup".into()).describe());
    }
}
