pub(crate) mod file;
pub(crate) mod process;

pub mod backend;
#[cfg(feature = "imap-backend")]
pub use backend::ImapBackend;
pub use backend::{Backend, ImapConfig, MemoryBackend, MemoryStore, Security};

pub mod domain;
pub use domain::*;

pub mod config;
pub use config::{Action, DedupConfig, Mark};

pub mod cli;
pub mod dedup;
pub mod reconcile;
