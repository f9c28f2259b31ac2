pub mod config;
pub use config::{ImapConfig, Security, PASSWD_ENV_VAR};

#[cfg(feature = "imap-backend")]
pub mod handshake;

#[cfg(feature = "imap-backend")]
pub mod backend;
#[cfg(feature = "imap-backend")]
pub use backend::{Error, ImapBackend, ImapSession, ImapSessionStream, ProcessStream, Result};
