//! Hierarchy module.

use log::{debug, info};

use super::Result;
use crate::backend::Backend;

/// Expands the folder into itself followed by its selectable
/// descendants, in listing order. A folder without hierarchy
/// delimiter has no descendant.
pub fn expand<B: Backend + ?Sized>(backend: &mut B, parent: &str) -> Result<Vec<String>> {
    let mut folders = vec![parent.to_owned()];

    let delim = backend
        .list_folders(parent, "")?
        .first()
        .and_then(|root| root.delim.clone())
        .filter(|delim| !delim.is_empty());

    match delim {
        Some(delim) => {
            let pattern = format!("{}*", delim);
            let children = backend.list_folders(parent, &pattern)?;
            folders.extend(
                children
                    .selectable_names()
                    .into_iter()
                    .filter(|name| name != parent),
            );
        }
        None => debug!("no hierarchy delimiter for {}, no descendant", parent),
    }

    info!(
        "Working recursively from mailbox {}. There are {} total mailboxes.",
        parent,
        folders.len()
    );

    Ok(folders)
}
