//! Stage module.
//!
//! This module contains the selection of the next reconciliation
//! stage, derived from the artifacts that already exist.

use std::fmt;

/// Represents a reconciliation stage.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Stage {
    /// Lists the source folders into the mailbox list.
    ListFolders,
    /// Collects the identities of the listed source folders.
    ScanSource,
    /// Collects the identities of the target recovery folder.
    ScanTarget,
    /// Marks the target messages already present at source.
    Purge,
}

impl Stage {
    pub fn number(&self) -> u8 {
        match self {
            Stage::ListFolders => 1,
            Stage::ScanSource => 2,
            Stage::ScanTarget => 3,
            Stage::Purge => 4,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::ListFolders => "list source folders",
            Stage::ScanSource => "scan source",
            Stage::ScanTarget => "scan target",
            Stage::Purge => "purge target",
        };
        write!(f, "stage {} ({})", self.number(), name)
    }
}

/// Selects the next stage given which artifacts exist: the mailbox
/// list, the source identities and the target identities. The first
/// missing artifact wins.
pub fn next_stage(mailboxes: bool, source_ids: bool, target_ids: bool) -> Stage {
    match (mailboxes, source_ids, target_ids) {
        // 0xx
        (false, _, _) => Stage::ListFolders,

        // 10x
        (true, false, _) => Stage::ScanSource,

        // 110
        (true, true, false) => Stage::ScanTarget,

        // 111
        (true, true, true) => Stage::Purge,
    }
}

#[cfg(test)]
mod tests {
    use super::{next_stage, Stage};

    #[test]
    fn first_missing_artifact_wins() {
        assert_eq!(Stage::ListFolders, next_stage(false, false, false));
        assert_eq!(Stage::ListFolders, next_stage(false, false, true));
        assert_eq!(Stage::ListFolders, next_stage(false, true, false));
        assert_eq!(Stage::ListFolders, next_stage(false, true, true));
        assert_eq!(Stage::ScanSource, next_stage(true, false, false));
        assert_eq!(Stage::ScanSource, next_stage(true, false, true));
        assert_eq!(Stage::ScanTarget, next_stage(true, true, false));
        assert_eq!(Stage::Purge, next_stage(true, true, true));
    }

    #[test]
    fn display() {
        assert_eq!("stage 4 (purge target)", Stage::Purge.to_string());
    }
}
