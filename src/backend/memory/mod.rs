pub mod backend;
pub use backend::{Error, MemoryBackend, MemoryMessage, MemoryStore, Result};
