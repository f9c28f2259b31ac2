//! Reconcile module.
//!
//! This module contains the reconciliation between a source account
//! and a target account holding imported copies of the source mail.
//! It runs in four stages, each leaving a file behind:
//!
//! 1. the source folders are listed into an editable mailbox list,
//! 2. the identities of the listed source folders are collected,
//! 3. the identities of the target recovery folder are collected,
//! 4. the target messages whose identity exists at source are marked.
//!
//! Only the last stage modifies anything.

pub mod artifacts;
pub mod config;
pub mod driver;
pub mod stage;

pub use artifacts::Artifacts;
pub use config::ReconcileConfig;
pub use driver::{run_next_stage, unmatched, Side, StageOutcome};
pub use stage::{next_stage, Stage};

use std::{io, path::PathBuf, result};
use thiserror::Error;

use crate::{backend, dedup};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read config file {1:?}")]
    ReadConfigFileError(#[source] io::Error, PathBuf),
    #[error("cannot parse config file {1:?}")]
    ParseConfigFileError(#[source] serde_json::Error, PathBuf),
    #[error("cannot find a work directory name from config file {0:?}")]
    InvalidConfigPathError(PathBuf),
    #[error("cannot create work directory {1:?}")]
    CreateWorkDirError(#[source] io::Error, PathBuf),

    #[error(transparent)]
    ConfigError(#[from] crate::config::Error),
    #[error(transparent)]
    DedupError(#[from] dedup::Error),
    #[error(transparent)]
    BackendError(#[from] backend::Error),
}

pub type Result<T> = result::Result<T, Error>;
