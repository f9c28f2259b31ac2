mod backend;

pub mod imap;
pub mod memory;

pub use self::backend::{to_sequence_set, Backend, Criterion, Error, Result, SearchQuery};
#[cfg(feature = "imap-backend")]
pub use self::imap::ImapBackend;
pub use self::imap::{ImapConfig, Security};
pub use self::memory::{MemoryBackend, MemoryStore};
