//! Artifacts module.
//!
//! This module contains the locations of the files each stage leaves
//! behind. They live in a work directory named after the config file,
//! next to it: `sync.json` gives `sync/`.

use log::debug;
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::{next_stage, Error, Result, Stage};

pub const MAILBOXES_FILE: &str = "mailboxes.json";
pub const SOURCE_IDS_FILE: &str = "source-ids.txt";
pub const TARGET_IDS_FILE: &str = "target-ids.txt";

/// Represents the artifacts of a reconciliation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Artifacts {
    pub dir: PathBuf,
    /// Source folders to scan, edited by the operator.
    pub mailboxes: PathBuf,
    pub source_ids: PathBuf,
    pub target_ids: PathBuf,
}

impl Artifacts {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_owned();
        Self {
            mailboxes: dir.join(MAILBOXES_FILE),
            source_ids: dir.join(SOURCE_IDS_FILE),
            target_ids: dir.join(TARGET_IDS_FILE),
            dir,
        }
    }

    /// Builds the artifacts of the given config file.
    pub fn from_config_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::InvalidConfigPathError(path.to_owned()))?;
        let dir = path.parent().unwrap_or_else(|| Path::new(".")).join(name);
        Ok(Self::new(dir))
    }

    /// Creates the work directory if needed.
    pub fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|err| Error::CreateWorkDirError(err, self.dir.clone()))
    }

    /// Selects the next stage from the artifacts found on disk.
    pub fn next_stage(&self) -> Stage {
        let stage = next_stage(
            self.mailboxes.exists(),
            self.source_ids.exists(),
            self.target_ids.exists(),
        );
        debug!("next stage from artifacts in {:?}: {}", self.dir, stage);
        stage
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};
    use tempfile::tempdir;

    use crate::reconcile::Stage;

    use super::Artifacts;

    #[test]
    fn work_dir_next_to_config() {
        let artifacts = Artifacts::from_config_path("/etc/imapdedup/sync.json").unwrap();
        assert_eq!(PathBuf::from("/etc/imapdedup/sync"), artifacts.dir);
        assert_eq!(
            PathBuf::from("/etc/imapdedup/sync/source-ids.txt"),
            artifacts.source_ids
        );

        assert!(Artifacts::from_config_path("/").is_err());
    }

    #[test]
    fn next_stage_from_disk() {
        let dir = tempdir().unwrap();
        let artifacts = Artifacts::new(dir.path().join("work"));
        artifacts.create_dir().unwrap();
        assert_eq!(Stage::ListFolders, artifacts.next_stage());

        fs::write(&artifacts.mailboxes, "[]").unwrap();
        assert_eq!(Stage::ScanSource, artifacts.next_stage());

        fs::write(&artifacts.target_ids, "").unwrap();
        assert_eq!(Stage::ScanSource, artifacts.next_stage());

        fs::write(&artifacts.source_ids, "").unwrap();
        assert_eq!(Stage::Purge, artifacts.next_stage());
    }
}
