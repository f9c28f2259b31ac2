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

//! Run module.
//!
//! This module contains the orchestration of a whole run on one
//! session: folder listing, or the scan and resolution of every folder
//! followed by the session teardown.

use log::{debug, info, warn};

use super::{
    expand, lists, resolve, FolderScan, ForcedDuplicates, IdentityTable, Resolution, Result,
    Scanner,
};
use crate::{backend::Backend, domain::email, DedupConfig, Identity};

/// Represents the outcome of one folder.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FolderReport {
    pub scan: FolderScan,
    pub resolution: Resolution,
}

/// Represents the outcome of a run.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RunReport {
    /// Selectable folders, when only listing.
    pub listed: Vec<String>,
    pub folders: Vec<FolderReport>,
}

impl RunReport {
    /// Returns every identity computed during the run, in discovery
    /// order.
    pub fn ids(&self) -> impl Iterator<Item = &Identity> {
        self.folders.iter().flat_map(|report| report.scan.ids.iter())
    }

    /// Returns the total number of duplicates found.
    pub fn duplicates(&self) -> usize {
        self.folders
            .iter()
            .map(|report| report.scan.duplicates.len())
            .sum()
    }
}

/// Runs the deduplication described by the config on the session.
///
/// The selected folder is closed unless `no_close` is set or the run
/// failed, and the session is always logged out. A logout error never
/// hides the error of the run itself.
pub fn run<B: Backend + ?Sized>(backend: &mut B, config: &DedupConfig) -> Result<RunReport> {
    let mut res = execute(backend, config);

    if res.is_ok() && !config.no_close {
        if let Err(err) = backend.close_folder() {
            res = Err(err.into());
        }
    }

    match backend.logout() {
        Ok(()) => debug!("logged out"),
        Err(err) if res.is_ok() => res = Err(err.into()),
        Err(err) => warn!("cannot logout: {}", err),
    }

    res
}

fn execute<B: Backend + ?Sized>(backend: &mut B, config: &DedupConfig) -> Result<RunReport> {
    config.validate()?;

    if config.lists_folders() {
        let listed = backend.list_folders("", "*")?.selectable_names();

        if let Some(path) = config.save_list.as_ref() {
            lists::write_mailbox_list(path, &listed)?;
            info!("Saved {} mailbox(es) to {:?}", listed.len(), path);
        }

        return Ok(RunReport {
            listed,
            ..RunReport::default()
        });
    }

    let forced = config
        .forced_ids
        .as_ref()
        .map(ForcedDuplicates::load)
        .transpose()?;

    let mut mailboxes = if config.recursive {
        expand(backend, &config.mailboxes[0])?
    } else {
        config.mailboxes.clone()
    };

    if config.reverse {
        mailboxes.reverse();
    }

    if mailboxes.len() > 1 {
        info!("Working with mailboxes in order: {}", mailboxes.join(", "));
    }

    let scanner = Scanner::new(config, forced.as_ref());
    let action = config.action();
    let mut table = IdentityTable::new();
    let mut report = RunReport::default();

    for folder in &mailboxes {
        let scan = scanner.scan(backend, folder, &mut table)?;

        let resolution = if config.collects_only() {
            Resolution::Skipped
        } else {
            resolve(backend, folder, &scan.flagged(), &action, config.sent_before)?
        };

        report.folders.push(FolderReport { scan, resolution });
    }
    debug!("{} distinct identities seen", table.len());

    if let Some(path) = config.save_ids.as_ref() {
        lists::write_identities(path, report.ids())?;
        info!("Saved {} identities to {:?}", report.ids().count(), path);
    }

    if let Some(path) = config.save_export.as_ref() {
        let rows = report
            .folders
            .iter()
            .flat_map(|report| report.scan.exports.iter());
        email::write_export(path, rows)?;
        info!("Saved message list to {:?}", path);
    }

    Ok(report)
}
