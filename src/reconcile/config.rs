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

//! Reconciliation config module.
//!
//! This module contains the JSON configuration of a reconciliation
//! between a source and a target account.

use chrono::NaiveDate;
use serde::Deserialize;
use std::{fs, path::Path};

use super::{Error, Result};
use crate::{config, IdentityMode, ImapConfig, Mark};

pub const DEFAULT_RECOVERY_FOLDER: &str = "recovered";

fn default_recovery_folder() -> String {
    DEFAULT_RECOVERY_FOLDER.to_owned()
}

/// Represents the reconciliation config.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReconcileConfig {
    /// Account holding the pre-existing mail, never modified.
    pub source: ImapConfig,
    /// Account holding the recovery folder.
    pub target: ImapConfig,
    #[serde(default = "default_recovery_folder")]
    pub recovery_folder: String,
    #[serde(default)]
    pub checksum: bool,
    #[serde(default)]
    pub checksum_with_id: bool,
    /// Tags the target duplicates instead of marking them as deleted.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub no_close: bool,
    /// Date like `1-Feb-2020`.
    #[serde(default)]
    pub sent_before: Option<String>,
}

impl ReconcileConfig {
    /// Reads and parses the config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|err| Error::ReadConfigFileError(err, path.to_owned()))?;
        serde_json::from_str(&content).map_err(|err| Error::ParseConfigFileError(err, path.to_owned()))
    }

    pub fn identity_mode(&self) -> Result<IdentityMode> {
        match (self.checksum, self.checksum_with_id) {
            (false, false) => Ok(IdentityMode::MessageId),
            (false, true) => Err(config::Error::ChecksumWithIdWithoutChecksumError.into()),
            (true, include_message_id) => Ok(IdentityMode::Checksum { include_message_id }),
        }
    }

    pub fn sent_before(&self) -> Result<Option<NaiveDate>> {
        Ok(self
            .sent_before
            .as_deref()
            .map(config::parse_sent_before)
            .transpose()?)
    }

    pub fn mark(&self) -> Mark {
        match self.tag.as_ref() {
            Some(tag) => Mark::Tag(tag.clone()),
            None => Mark::Deleted,
        }
    }
}
