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

//! Scanner module.
//!
//! This module contains the scan of one folder: the undeleted messages
//! are fetched in batches, their identity computed and recorded in the
//! identity table of the run.

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::cmp;

use super::{ForcedDuplicates, IdentityTable, Location, Result};
use crate::{
    backend::{Backend, Criterion, SearchQuery},
    config::DEFAULT_FETCH_BATCH_SIZE,
    DedupConfig, ExportRow, Identity, IdentityMode, Message,
};

/// Represents a message flagged as a duplicate.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Duplicate {
    pub seq: u32,
    pub id: Identity,
    /// Where the identity was first seen.
    pub canonical: Location,
}

/// Represents the result of a folder scan.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FolderScan {
    pub folder: String,
    /// Number of messages in the folder when selected.
    pub exists: u32,
    pub deleted_before: usize,
    pub undeleted_before: usize,
    /// Number of messages fetched.
    pub scanned: usize,
    /// Every identity computed, in discovery order.
    pub ids: Vec<Identity>,
    pub duplicates: Vec<Duplicate>,
    /// Export rows, only filled when exporting.
    pub exports: Vec<ExportRow>,
}

impl FolderScan {
    /// Returns the sequence numbers of the duplicates.
    pub fn flagged(&self) -> Vec<u32> {
        self.duplicates.iter().map(|dup| dup.seq).collect()
    }
}

/// Represents the folder scanner of a run.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    pub mode: IdentityMode,
    pub sent_before: Option<NaiveDate>,
    pub batch_size: usize,
    /// Selects folders with EXAMINE, nothing can be modified.
    pub readonly: bool,
    pub forced: Option<&'a ForcedDuplicates>,
    pub export: bool,
    pub show: bool,
    pub verbose: bool,
}

impl Default for Scanner<'_> {
    fn default() -> Self {
        Self {
            mode: IdentityMode::default(),
            sent_before: None,
            batch_size: DEFAULT_FETCH_BATCH_SIZE,
            readonly: false,
            forced: None,
            export: false,
            show: false,
            verbose: false,
        }
    }
}

impl<'a> Scanner<'a> {
    pub fn new(config: &DedupConfig, forced: Option<&'a ForcedDuplicates>) -> Self {
        Self {
            mode: config.identity_mode,
            sent_before: config.sent_before,
            batch_size: config.fetch_batch_size,
            readonly: config.dry_run,
            forced,
            export: config.save_export.is_some(),
            show: config.show,
            verbose: config.verbose,
        }
    }

    /// Selects the folder and scans its undeleted messages, recording
    /// their identities in the table. The folder stays selected.
    pub fn scan<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        folder: &str,
        table: &mut IdentityTable,
    ) -> Result<FolderScan> {
        let exists = backend.select_folder(folder, self.readonly)?;
        info!("There are {} messages in {}.", exists, folder);

        let deleted = backend
            .search(&SearchQuery::new(Criterion::Deleted, self.sent_before))?
            .len();
        info!("{} message(s) currently marked as deleted in {}", deleted, folder);

        let seqs = backend.search(&SearchQuery::new(Criterion::Undeleted, self.sent_before))?;
        info!("{} others in {}", seqs.len(), folder);

        let mut scan = FolderScan {
            folder: folder.to_owned(),
            exists,
            deleted_before: deleted,
            undeleted_before: seqs.len(),
            ..FolderScan::default()
        };

        let batch_size = cmp::max(self.batch_size, 1);
        debug!("reading messages in batches of {}", batch_size);

        for (i, batch) in seqs.chunks(batch_size).enumerate() {
            debug!("batch starting at item {}", i * batch_size);

            for (seq, raw) in backend.fetch_headers(batch)? {
                scan.scanned += 1;

                let msg = match Message::parse(folder, seq, raw) {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!("{}, message skipped", err);
                        continue;
                    }
                };

                if self.export {
                    scan.exports.push(ExportRow::from_message(&msg));
                }

                if self.verbose {
                    debug!("checking {} message {}", folder, seq);
                }

                let id = match self.mode.compute(&msg) {
                    Some(id) => id,
                    None => continue,
                };

                if let Some(dup) = self.check(&msg, &id, table) {
                    scan.duplicates.push(dup);
                }

                scan.ids.push(id);
            }

            info!(
                "{} message(s) in {} processed",
                cmp::min(seqs.len(), (i + 1) * batch_size),
                folder
            );
        }

        Ok(scan)
    }

    fn check(&self, msg: &Message, id: &Identity, table: &mut IdentityTable) -> Option<Duplicate> {
        let canonical = table.record(id, Location::seen(&msg.folder, msg.seq), self.forced)?;

        info!("Message {} is a duplicate of {}", msg.location(), canonical);

        if self.show || self.verbose {
            info!(
                "Subject: {}\nFrom: {}\nDate: {}",
                msg.header_or_empty("Subject"),
                msg.header_or_empty("From"),
                msg.header_or_empty("Date"),
            );
        }

        if self.verbose {
            for name in ["To", "Cc", "Bcc"] {
                debug!("{}: {}", name, msg.header_or_empty(name));
            }
        }

        Some(Duplicate {
            seq: msg.seq,
            id: id.clone(),
            canonical,
        })
    }
}
