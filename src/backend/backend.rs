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

//! Backend module.
//!
//! This module exposes the backend trait, the session abstraction the
//! deduplication runs on. Every call is a synchronous request and
//! response exchange with the mail store.

use chrono::NaiveDate;
use std::{fmt, result};
use thiserror::Error;

use crate::{backend, Flags, Folders};

#[derive(Debug, Error)]
pub enum Error {
    #[cfg(feature = "imap-backend")]
    #[error(transparent)]
    ImapBackendError(#[from] backend::imap::Error),
    #[error(transparent)]
    MemoryBackendError(#[from] backend::memory::Error),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the criterion of a message search.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Criterion {
    Deleted,
    Undeleted,
    Keyword(String),
}

/// Represents a message search in the selected folder.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SearchQuery {
    pub criterion: Criterion,
    /// Only matches messages whose Date header is earlier than the
    /// given day.
    pub sent_before: Option<NaiveDate>,
}

impl SearchQuery {
    pub fn new(criterion: Criterion, sent_before: Option<NaiveDate>) -> Self {
        Self {
            criterion,
            sent_before,
        }
    }

    /// Builds the IMAP SEARCH query.
    pub fn to_imap_query(&self) -> String {
        let mut query = match &self.criterion {
            Criterion::Deleted => String::from("DELETED"),
            Criterion::Undeleted => String::from("UNDELETED"),
            Criterion::Keyword(keyword) => format!("KEYWORD {}", keyword),
        };

        if let Some(date) = self.sent_before {
            query.push_str(&format!(" SENTBEFORE {}", date.format("%-d-%b-%Y")));
        }

        query
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_imap_query())
    }
}

/// Represents a session opened on a mail store.
///
/// Sequence numbers always refer to the currently selected folder.
pub trait Backend {
    /// Lists the folders matching the given reference and pattern. An
    /// empty pattern only returns the hierarchy delimiter of the
    /// reference.
    fn list_folders(&mut self, reference: &str, pattern: &str) -> Result<Folders>;

    /// Selects the given folder, read-only when `readonly` is set.
    /// Returns the number of messages it contains.
    fn select_folder(&mut self, folder: &str, readonly: bool) -> Result<u32>;

    /// Returns the sequence numbers matching the query, in ascending
    /// order.
    fn search(&mut self, query: &SearchQuery) -> Result<Vec<u32>>;

    /// Fetches the raw header block of the given messages.
    fn fetch_headers(&mut self, seqs: &[u32]) -> Result<Vec<(u32, Vec<u8>)>>;

    /// Copies the given messages to another folder.
    fn copy_emails(&mut self, seqs: &[u32], folder: &str) -> Result<()>;

    /// Adds the given flags to the given messages.
    fn add_flags(&mut self, seqs: &[u32], flags: &Flags) -> Result<()>;

    /// Closes the selected folder. Some servers purge the messages
    /// marked as deleted at this point.
    fn close_folder(&mut self) -> Result<()>;

    /// Ends the session.
    fn logout(&mut self) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn list_folders(&mut self, reference: &str, pattern: &str) -> Result<Folders> {
        (**self).list_folders(reference, pattern)
    }

    fn select_folder(&mut self, folder: &str, readonly: bool) -> Result<u32> {
        (**self).select_folder(folder, readonly)
    }

    fn search(&mut self, query: &SearchQuery) -> Result<Vec<u32>> {
        (**self).search(query)
    }

    fn fetch_headers(&mut self, seqs: &[u32]) -> Result<Vec<(u32, Vec<u8>)>> {
        (**self).fetch_headers(seqs)
    }

    fn copy_emails(&mut self, seqs: &[u32], folder: &str) -> Result<()> {
        (**self).copy_emails(seqs, folder)
    }

    fn add_flags(&mut self, seqs: &[u32], flags: &Flags) -> Result<()> {
        (**self).add_flags(seqs, flags)
    }

    fn close_folder(&mut self) -> Result<()> {
        (**self).close_folder()
    }

    fn logout(&mut self) -> Result<()> {
        (**self).logout()
    }
}

/// Joins sequence numbers into an IMAP sequence set.
pub fn to_sequence_set(seqs: &[u32]) -> String {
    seqs.iter()
        .map(|seq| seq.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
