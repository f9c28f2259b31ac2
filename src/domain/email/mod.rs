//! Email module.
//!
//! This module contains everything related to the emails being
//! deduplicated: header decoding, identity computation and export.

use std::{io, path::PathBuf, result};
use thiserror::Error;

pub mod export;
pub use export::*;

pub mod header;

pub mod identity;
pub use identity::*;

pub mod message;
pub use message::*;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse headers of message {2} in folder {1}")]
    ParseHeadersError(#[source] mailparse::MailParseError, String, u32),
    #[error("cannot write message export {1:?}")]
    WriteExportError(#[source] io::Error, PathBuf),
}

pub type Result<T> = result::Result<T, Error>;
