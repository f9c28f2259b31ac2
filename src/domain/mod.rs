pub mod email;
pub use email::{ExportRow, Identity, IdentityMode, Message};

pub mod flag;
pub use flag::{Flag, Flags};

pub mod folder;
pub use folder::{Folder, Folders};
