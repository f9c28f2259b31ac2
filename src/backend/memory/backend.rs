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

//! In-memory backend module.
//!
//! This module contains a backend working on a mail store kept in
//! memory. The store is shared: the backend mutates it like a server
//! would, and the caller keeps a handle to inspect the result.

use log::{debug, trace};
use mailparse::MailHeaderMap;
use std::{
    result,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;

use crate::{
    backend::{self, Backend, Criterion, SearchQuery},
    Flag, Flags, Folder, Folders,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find folder {0}")]
    FolderNotFoundError(String),
    #[error("cannot find message {0} in folder {1}")]
    MsgNotFoundError(u32, String),
    #[error("cannot execute command: no folder selected")]
    NoFolderSelectedError,
    #[error("cannot modify folder {0}: folder selected as read-only")]
    ReadOnlyFolderError(String),
    #[error("cannot execute command: session logged out")]
    LoggedOutError,
}

pub type Result<T> = result::Result<T, Error>;

/// Represents a message of the in-memory store.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct MemoryMessage {
    pub header: Vec<u8>,
    pub flags: Flags,
}

#[derive(Debug, Clone, Default)]
struct MemoryFolder {
    name: String,
    attributes: Vec<String>,
    messages: Vec<MemoryMessage>,
}

#[derive(Debug, Default)]
struct Store {
    delim: Option<String>,
    folders: Vec<MemoryFolder>,
}

impl Store {
    fn folder(&self, name: &str) -> Result<&MemoryFolder> {
        self.folders
            .iter()
            .find(|folder| folder.name == name)
            .ok_or_else(|| Error::FolderNotFoundError(name.to_owned()))
    }

    fn folder_mut(&mut self, name: &str) -> Result<&mut MemoryFolder> {
        self.folders
            .iter_mut()
            .find(|folder| folder.name == name)
            .ok_or_else(|| Error::FolderNotFoundError(name.to_owned()))
    }
}

/// Represents the in-memory mail store. Clones share the same
/// underlying store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<Mutex<Store>>);

impl MemoryStore {
    /// Creates an empty store using the given hierarchy delimiter.
    /// `None` gives a flat store.
    pub fn new(delim: Option<&str>) -> Self {
        Self(Arc::new(Mutex::new(Store {
            delim: delim.map(ToOwned::to_owned),
            folders: Vec::new(),
        })))
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a selectable folder. Adding an existing folder does
    /// nothing.
    pub fn add_folder(&self, name: &str) -> &Self {
        self.add_folder_with(name, &[])
    }

    /// Adds a folder with the given attributes, like `\Noselect`.
    pub fn add_folder_with(&self, name: &str, attributes: &[&str]) -> &Self {
        let mut store = self.lock();
        if store.folder(name).is_err() {
            store.folders.push(MemoryFolder {
                name: name.to_owned(),
                attributes: attributes.iter().map(|attr| attr.to_string()).collect(),
                messages: Vec::new(),
            });
        }
        self
    }

    /// Appends a message to the given folder, creating the folder when
    /// it does not exist. Returns the sequence number of the message.
    pub fn append<H: AsRef<[u8]>>(&self, folder: &str, header: H) -> u32 {
        self.append_with_flags(folder, header, Flags::default())
    }

    pub fn append_with_flags<H: AsRef<[u8]>>(&self, folder: &str, header: H, flags: Flags) -> u32 {
        self.add_folder(folder);
        let mut store = self.lock();
        let messages = match store.folder_mut(folder) {
            Ok(folder) => &mut folder.messages,
            Err(_) => return 0,
        };
        messages.push(MemoryMessage {
            header: header.as_ref().to_vec(),
            flags,
        });
        messages.len() as u32
    }

    /// Returns the names of all the folders, in creation order.
    pub fn folder_names(&self) -> Vec<String> {
        self.lock()
            .folders
            .iter()
            .map(|folder| folder.name.clone())
            .collect()
    }

    /// Returns a copy of the messages of the given folder.
    pub fn messages(&self, folder: &str) -> Vec<MemoryMessage> {
        self.lock()
            .folder(folder)
            .map(|folder| folder.messages.clone())
            .unwrap_or_default()
    }

    /// Returns the flags of the message at the given sequence number.
    pub fn flags_of(&self, folder: &str, seq: u32) -> Option<Flags> {
        self.messages(folder)
            .get((seq as usize).checked_sub(1)?)
            .map(|msg| msg.flags.clone())
    }

    /// Counts the messages of the given folder carrying the flag.
    pub fn count_flagged(&self, folder: &str, flag: &Flag) -> usize {
        self.messages(folder)
            .iter()
            .filter(|msg| msg.flags.contains(flag))
            .count()
    }
}

/// Represents the in-memory backend, one session on a [`MemoryStore`].
pub struct MemoryBackend {
    store: MemoryStore,
    selected: Option<String>,
    readonly: bool,
    logged_out: bool,
}

impl MemoryBackend {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            selected: None,
            readonly: false,
            logged_out: false,
        }
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    fn ensure_logged_in(&self) -> Result<()> {
        if self.logged_out {
            return Err(Error::LoggedOutError);
        }
        Ok(())
    }

    fn selected_folder(&self) -> Result<String> {
        self.ensure_logged_in()?;
        self.selected.clone().ok_or(Error::NoFolderSelectedError)
    }

    fn writable_folder(&self) -> Result<String> {
        let folder = self.selected_folder()?;
        if self.readonly {
            return Err(Error::ReadOnlyFolderError(folder));
        }
        Ok(folder)
    }

    fn list(&self, reference: &str, pattern: &str) -> Result<Folders> {
        self.ensure_logged_in()?;
        let store = self.store.lock();

        if pattern.is_empty() {
            return Ok(Folders(vec![Folder {
                delim: store.delim.clone(),
                name: String::new(),
                attributes: vec![String::from("\\Noselect")],
            }]));
        }

        let pattern: Vec<char> = format!("{}{}", reference, pattern).chars().collect();
        let delim = store.delim.as_deref().and_then(|delim| delim.chars().next());

        Ok(store
            .folders
            .iter()
            .filter(|folder| {
                let name: Vec<char> = folder.name.chars().collect();
                wildcard_match(&pattern, &name, delim)
            })
            .map(|folder| Folder {
                delim: store.delim.clone(),
                name: folder.name.clone(),
                attributes: folder.attributes.clone(),
            })
            .collect())
    }

    fn search_folder(&self, query: &SearchQuery) -> Result<Vec<u32>> {
        let folder = self.selected_folder()?;
        let store = self.store.lock();
        let messages = &store.folder(&folder)?.messages;

        let before = query
            .sent_before
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|date| date.and_utc().timestamp());

        Ok(messages
            .iter()
            .enumerate()
            .filter(|(_, msg)| match &query.criterion {
                Criterion::Deleted => msg.flags.contains(&Flag::Deleted),
                Criterion::Undeleted => !msg.flags.contains(&Flag::Deleted),
                Criterion::Keyword(keyword) => msg.flags.contains(&Flag::custom(keyword)),
            })
            .filter(|(_, msg)| match before {
                Some(before) => sent_at(&msg.header).map_or(false, |sent| sent < before),
                None => true,
            })
            .map(|(idx, _)| idx as u32 + 1)
            .collect())
    }

    fn fetch(&self, seqs: &[u32]) -> Result<Vec<(u32, Vec<u8>)>> {
        let folder = self.selected_folder()?;
        let store = self.store.lock();
        let messages = &store.folder(&folder)?.messages;

        seqs.iter()
            .map(|seq| {
                let idx = (*seq as usize).wrapping_sub(1);
                messages
                    .get(idx)
                    .map(|msg| (*seq, msg.header.clone()))
                    .ok_or_else(|| Error::MsgNotFoundError(*seq, folder.clone()))
            })
            .collect()
    }

    fn copy(&self, seqs: &[u32], target: &str) -> Result<()> {
        let folder = self.selected_folder()?;
        let mut store = self.store.lock();
        store.folder(target)?;

        let messages = &store.folder(&folder)?.messages;
        let copies = seqs
            .iter()
            .map(|seq| {
                messages
                    .get((*seq as usize).wrapping_sub(1))
                    .cloned()
                    .ok_or_else(|| Error::MsgNotFoundError(*seq, folder.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        store.folder_mut(target)?.messages.extend(copies);
        Ok(())
    }

    fn store_flags(&self, seqs: &[u32], flags: &Flags) -> Result<()> {
        let folder = self.writable_folder()?;
        let mut store = self.store.lock();
        let messages = &mut store.folder_mut(&folder)?.messages;

        for seq in seqs {
            let msg = messages
                .get_mut((*seq as usize).wrapping_sub(1))
                .ok_or_else(|| Error::MsgNotFoundError(*seq, folder.clone()))?;
            msg.flags.0.extend(flags.iter().cloned());
        }

        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.ensure_logged_in()?;

        if let Some(folder) = self.selected.take() {
            if !self.readonly {
                let mut store = self.store.lock();
                let messages = &mut store.folder_mut(&folder)?.messages;
                let count = messages.len();
                messages.retain(|msg| !msg.flags.contains(&Flag::Deleted));
                debug!("expunged {} message(s) from {}", count - messages.len(), folder);
            }
        }

        self.readonly = false;
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn list_folders(&mut self, reference: &str, pattern: &str) -> backend::Result<Folders> {
        Ok(self.list(reference, pattern)?)
    }

    fn select_folder(&mut self, folder: &str, readonly: bool) -> backend::Result<u32> {
        self.ensure_logged_in()?;
        let exists = self.store.lock().folder(folder)?.messages.len() as u32;
        trace!("select {} (readonly: {}): {} message(s)", folder, readonly, exists);

        self.selected = Some(folder.to_owned());
        self.readonly = readonly;
        Ok(exists)
    }

    fn search(&mut self, query: &SearchQuery) -> backend::Result<Vec<u32>> {
        Ok(self.search_folder(query)?)
    }

    fn fetch_headers(&mut self, seqs: &[u32]) -> backend::Result<Vec<(u32, Vec<u8>)>> {
        Ok(self.fetch(seqs)?)
    }

    fn copy_emails(&mut self, seqs: &[u32], folder: &str) -> backend::Result<()> {
        Ok(self.copy(seqs, folder)?)
    }

    fn add_flags(&mut self, seqs: &[u32], flags: &Flags) -> backend::Result<()> {
        Ok(self.store_flags(seqs, flags)?)
    }

    fn close_folder(&mut self) -> backend::Result<()> {
        Ok(self.close()?)
    }

    fn logout(&mut self) -> backend::Result<()> {
        self.ensure_logged_in()?;
        self.selected = None;
        self.logged_out = true;
        Ok(())
    }
}

/// Matches a folder name against a LIST pattern: `*` matches
/// anything, `%` matches anything but the hierarchy delimiter.
fn wildcard_match(pattern: &[char], name: &[char], delim: Option<char>) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some(('*', rest)) => (0..=name.len()).any(|i| wildcard_match(rest, &name[i..], delim)),
        Some(('%', rest)) => {
            for i in 0..=name.len() {
                if i > 0 && Some(name[i - 1]) == delim {
                    break;
                }
                if wildcard_match(rest, &name[i..], delim) {
                    return true;
                }
            }
            false
        }
        Some((c, rest)) => name.first() == Some(c) && wildcard_match(rest, &name[1..], delim),
    }
}

/// Returns the timestamp of the Date header of a raw header block.
fn sent_at(header: &[u8]) -> Option<i64> {
    let (headers, _) = mailparse::parse_headers(header).ok()?;
    let date = headers.get_first_value("Date")?;
    mailparse::dateparse(&date).ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::{
        backend::{Backend, Criterion, SearchQuery},
        Flag, Flags,
    };

    use super::{wildcard_match, MemoryBackend, MemoryStore};

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn wildcards() {
        let delim = Some('/');
        assert!(wildcard_match(&chars("*"), &chars("INBOX/a/b"), delim));
        assert!(wildcard_match(&chars("INBOX/*"), &chars("INBOX/a/b"), delim));
        assert!(!wildcard_match(&chars("INBOX/*"), &chars("INBOX"), delim));
        assert!(wildcard_match(&chars("INBOX/%"), &chars("INBOX/a"), delim));
        assert!(!wildcard_match(&chars("INBOX/%"), &chars("INBOX/a/b"), delim));
        assert!(!wildcard_match(&chars("INBOX/*"), &chars("INBOXES/a"), delim));
    }

    #[test]
    fn list_folders() {
        let store = MemoryStore::new(Some("."));
        store
            .add_folder("INBOX")
            .add_folder_with("Archive", &["\\Noselect"])
            .add_folder("Archive.2020");
        let mut backend = MemoryBackend::new(store);

        let folders = backend.list_folders("", "*").unwrap();
        assert_eq!(3, folders.len());
        assert_eq!(vec!["INBOX", "Archive.2020"], folders.selectable_names());

        let root = backend.list_folders("Archive", "").unwrap();
        assert_eq!(Some("."), root[0].delim.as_deref());

        let children = backend.list_folders("Archive", ".*").unwrap();
        assert_eq!(vec!["Archive.2020"], children.selectable_names());
    }

    #[test]
    fn readonly_selection() {
        let store = MemoryStore::new(Some("/"));
        store.append("INBOX", "Message-ID: <a@x>\r\n\r\n");
        let mut backend = MemoryBackend::new(store.clone());

        backend.select_folder("INBOX", true).unwrap();
        let deleted = Flags::from_iter([Flag::Deleted]);
        assert!(backend.add_flags(&[1], &deleted).is_err());

        backend.select_folder("INBOX", false).unwrap();
        backend.add_flags(&[1], &deleted).unwrap();
        assert_eq!(1, store.count_flagged("INBOX", &Flag::Deleted));

        backend.close_folder().unwrap();
        assert!(store.messages("INBOX").is_empty());
    }

    #[test]
    fn search_sent_before() {
        let store = MemoryStore::new(Some("/"));
        store.append("INBOX", "Date: Mon, 6 Jan 2020 10:00:00 +0000\r\n\r\n");
        store.append("INBOX", "Date: Wed, 5 Feb 2020 10:00:00 +0000\r\n\r\n");
        store.append("INBOX", "Subject: no date\r\n\r\n");
        let mut backend = MemoryBackend::new(store);
        backend.select_folder("INBOX", true).unwrap();

        let all = SearchQuery::new(Criterion::Undeleted, None);
        assert_eq!(vec![1, 2, 3], backend.search(&all).unwrap());

        let date = NaiveDate::from_ymd_opt(2020, 2, 1);
        let before = SearchQuery::new(Criterion::Undeleted, date);
        assert_eq!(vec![1], backend.search(&before).unwrap());
    }

    #[test]
    fn logout() {
        let mut backend = MemoryBackend::new(MemoryStore::new(None));
        backend.logout().unwrap();
        assert!(backend.is_logged_out());
        assert!(backend.select_folder("INBOX", true).is_err());
    }
}
