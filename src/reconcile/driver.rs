//! Driver module.
//!
//! This module contains the execution of one reconciliation stage. The
//! stage is derived from the artifacts on disk, exactly one stage runs
//! per call.

use log::info;
use std::collections::HashSet;

use super::{Artifacts, ReconcileConfig, Result, Stage};
use crate::{
    backend::{self, Backend},
    dedup::{self, lists, RunReport},
    DedupConfig, Identity, ImapConfig,
};

/// Represents the account a stage connects to.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Side {
    Source,
    Target,
}

/// Represents the outcome of a stage.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StageOutcome {
    ListedFolders {
        mailboxes: Vec<String>,
    },
    ScannedSource {
        ids: usize,
    },
    ScannedTarget {
        ids: usize,
    },
    Purged {
        report: RunReport,
        /// Target identities never seen at source, in discovery
        /// order, without repetition.
        unmatched: Vec<Identity>,
        /// Number of distinct target identities.
        target_count: usize,
    },
}

/// Runs the next stage. `connect` opens an authenticated session on
/// the given account.
pub fn run_next_stage<B, F>(
    config: &ReconcileConfig,
    artifacts: &Artifacts,
    mut connect: F,
) -> Result<(Stage, StageOutcome)>
where
    B: Backend,
    F: FnMut(Side, &ImapConfig) -> backend::Result<B>,
{
    artifacts.create_dir()?;
    let stage = artifacts.next_stage();
    info!("Running {}", stage);

    let base = DedupConfig {
        identity_mode: config.identity_mode()?,
        sent_before: config.sent_before()?,
        mark: config.mark(),
        no_close: config.no_close,
        ..DedupConfig::default()
    };

    let outcome = match stage {
        Stage::ListFolders => {
            let dedup_config = DedupConfig {
                save_list: Some(artifacts.mailboxes.clone()),
                ..base
            };
            dedup_config.validate()?;

            let mut backend = connect(Side::Source, &config.source)?;
            let report = dedup::run(&mut backend, &dedup_config)?;

            info!("Saved list of mailboxes to {:?}", artifacts.mailboxes);
            info!("Remove the mailboxes that should not be scanned, then run again to collect the source identities.");
            StageOutcome::ListedFolders {
                mailboxes: report.listed,
            }
        }
        Stage::ScanSource => {
            let dedup_config = DedupConfig {
                mailboxes: lists::read_mailbox_list(&artifacts.mailboxes)?,
                dry_run: true,
                save_ids: Some(artifacts.source_ids.clone()),
                ..base
            };
            dedup_config.validate()?;

            let mut backend = connect(Side::Source, &config.source)?;
            let report = dedup::run(&mut backend, &dedup_config)?;

            info!("Wrote source identities to {:?}", artifacts.source_ids);
            info!("Run again to collect the identities of the target.");
            StageOutcome::ScannedSource {
                ids: report.ids().count(),
            }
        }
        Stage::ScanTarget => {
            let dedup_config = DedupConfig {
                mailboxes: vec![config.recovery_folder.clone()],
                dry_run: true,
                save_ids: Some(artifacts.target_ids.clone()),
                ..base
            };
            dedup_config.validate()?;

            let mut backend = connect(Side::Target, &config.target)?;
            let report = dedup::run(&mut backend, &dedup_config)?;

            info!("Wrote target identities to {:?}", artifacts.target_ids);
            info!("Run again to mark the target messages already present at source.");
            StageOutcome::ScannedTarget {
                ids: report.ids().count(),
            }
        }
        Stage::Purge => {
            let dedup_config = DedupConfig {
                mailboxes: vec![config.recovery_folder.clone()],
                dry_run: config.dry_run,
                forced_ids: Some(artifacts.source_ids.clone()),
                ..base
            };
            dedup_config.validate()?;

            let source_ids = lists::read_identities(&artifacts.source_ids)?;
            let target_ids = lists::read_identities(&artifacts.target_ids)?;

            let mut backend = connect(Side::Target, &config.target)?;
            let report = dedup::run(&mut backend, &dedup_config)?;

            let (unmatched, target_count) = unmatched(&source_ids, &target_ids);
            info!(
                "Found {} unmatched out of {}",
                unmatched.len(),
                target_count
            );

            StageOutcome::Purged {
                report,
                unmatched,
                target_count,
            }
        }
    };

    Ok((stage, outcome))
}

/// Computes the target identities missing from the source, and the
/// number of distinct target identities.
pub fn unmatched(source: &[Identity], target: &[Identity]) -> (Vec<Identity>, usize) {
    let source: HashSet<&Identity> = source.iter().collect();
    let mut seen: HashSet<&Identity> = HashSet::new();

    let unmatched = target
        .iter()
        .filter(|id| seen.insert(*id) && !source.contains(*id))
        .cloned()
        .collect();

    (unmatched, seen.len())
}
