//! Lists module.
//!
//! This module contains the files a run reads and writes: the mailbox
//! list, a pretty JSON array meant to be edited by hand, and identity
//! lists, one identity per line.

use std::{fs, io::Write, path::Path};

use super::{Error, Result};
use crate::{file, Identity};

pub fn write_mailbox_list<P: AsRef<Path>>(path: P, mailboxes: &[String]) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(mailboxes).map_err(Error::SerializeMailboxListError)?;
    file::write_atomically(path, |file| writeln!(file, "{}", json))
        .map_err(|err| Error::WriteMailboxListError(err, path.to_owned()))
}

pub fn read_mailbox_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let json =
        fs::read_to_string(path).map_err(|err| Error::ReadMailboxListError(err, path.to_owned()))?;
    serde_json::from_str(&json).map_err(|err| Error::ParseMailboxListError(err, path.to_owned()))
}

/// Writes identities one per line, in the given order.
pub fn write_identities<'a, P, I>(path: P, ids: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a Identity>,
{
    let path = path.as_ref();
    file::write_atomically(path, |file| {
        for id in ids {
            writeln!(file, "{}", id)?;
        }
        Ok(())
    })
    .map_err(|err| Error::WriteIdentitiesError(err, path.to_owned()))
}

/// Reads identities one per line. Lines are trimmed, blank lines are
/// ignored.
pub fn read_identities<P: AsRef<Path>>(path: P) -> Result<Vec<Identity>> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).map_err(|err| Error::ReadIdentitiesError(err, path.to_owned()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Identity::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use tempfile::tempdir;

    use crate::{file::tmp_path, Identity};

    use super::*;

    #[test]
    fn mailbox_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mailboxes.json");

        let mailboxes = vec![String::from("INBOX"), String::from("Archive/2020")];
        write_mailbox_list(&path, &mailboxes).unwrap();
        assert_eq!(
            "[\n  \"INBOX\",\n  \"Archive/2020\"\n]\n",
            fs::read_to_string(&path).unwrap()
        );
        assert_eq!(mailboxes, read_mailbox_list(&path).unwrap());
    }

    #[test]
    fn identities_keep_order_and_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ids.txt");

        let ids: Vec<Identity> = vec!["<b@x>".into(), "<a@x>".into(), "<b@x>".into()];
        write_identities(&path, &ids).unwrap();
        assert_eq!("<b@x>\n<a@x>\n<b@x>\n", fs::read_to_string(&path).unwrap());
        assert!(!tmp_path(&path).exists());

        fs::write(&path, "<b@x>\n\n  <a@x> \n").unwrap();
        assert_eq!(
            vec![Identity::from("<b@x>"), Identity::from("<a@x>")],
            read_identities(&path).unwrap()
        );
    }

    #[test]
    fn failed_write_keeps_previous_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mailboxes.json");
        fs::write(&path, "[\"INBOX\"]\n").unwrap();

        // the temporary sibling cannot be created over a directory
        fs::create_dir(tmp_path(&path)).unwrap();
        assert!(write_mailbox_list(&path, &[String::from("Archive")]).is_err());
        assert_eq!(vec![String::from("INBOX")], read_mailbox_list(&path).unwrap());
    }
}
