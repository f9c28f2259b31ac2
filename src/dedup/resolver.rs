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

//! Resolver module.
//!
//! This module contains the resolution of the duplicates of the
//! selected folder: they are optionally copied, then marked, in
//! batches. Nothing is ever expunged here.

use chrono::NaiveDate;
use log::{debug, info};
use std::cmp;

use super::{count, Counts, Error, Result};
use crate::{backend::Backend, Action};

/// Represents what happened to the duplicates of a folder.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Resolution {
    /// No duplicate found.
    Nothing,
    /// Identities or messages were collected instead.
    Skipped,
    /// Dry run: the duplicates would have been marked.
    DryRun { flagged: usize },
    /// The duplicates were marked. Holds the counts queried
    /// afterwards.
    Applied { flagged: usize, counts: Counts },
}

/// Applies the action to the flagged messages of the selected folder.
pub fn resolve<B: Backend + ?Sized>(
    backend: &mut B,
    folder: &str,
    flagged: &[u32],
    action: &Action,
    sent_before: Option<NaiveDate>,
) -> Result<Resolution> {
    if flagged.is_empty() {
        info!("No duplicates were found in {}", folder);
        return Ok(Resolution::Nothing);
    }

    if action.dry_run {
        info!(
            "If you had NOT selected the dry-run option, {} messages would now be {}.",
            flagged.len(),
            action.mark.describe()
        );
        return Ok(Resolution::DryRun {
            flagged: flagged.len(),
        });
    }

    if let Some(target) = action.copy_to.as_deref() {
        info!("Copying {} messages to '{}'...", flagged.len(), target);
    }
    info!("{} messages will be {}...", flagged.len(), action.mark.describe());

    let flags = action.mark.to_flags();
    let batch_size = cmp::max(action.batch_size, 1);
    debug!("marking in batches of {}", batch_size);

    for (i, batch) in flagged.chunks(batch_size).enumerate() {
        if let Some(target) = action.copy_to.as_deref() {
            backend
                .copy_emails(batch, target)
                .map_err(|err| Error::CopyDuplicatesError(err, folder.to_owned(), target.to_owned()))?;
        }
        backend.add_flags(batch, &flags)?;
        debug!("batch starting at item {} marked", i * batch_size);
    }

    info!("Confirming new numbers...");
    let counts = count(backend, sent_before, action.mark.tag())?;
    info!(
        "There are now {} messages marked as deleted and {} others in {}.",
        counts.deleted, counts.undeleted, folder
    );
    if let (Some(tagged), Some(tag)) = (counts.tagged, action.mark.tag()) {
        info!("There are now {} messages tagged as '{}' in {}.", tagged, tag, folder);
    }

    Ok(Resolution::Applied {
        flagged: flagged.len(),
        counts,
    })
}
