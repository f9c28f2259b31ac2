//! Export module.
//!
//! This module contains the message export: one tab-separated row
//! per scanned message with the sender, its bare address, the subject
//! and the date.

use log::warn;
use std::{io::Write, path::Path};

use super::{Error, Message, Result};
use crate::file;

pub const EXPORT_HEADER: &str = "from\temail\tsubject\tdate";

/// Represents one row of the message export.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ExportRow {
    pub from: String,
    pub email: String,
    pub subject: String,
    pub date: String,
}

impl ExportRow {
    pub fn from_message(msg: &Message) -> Self {
        let from = msg.header_or_empty("From");

        if !from.contains('@') {
            warn!("no email address found in sender {:?} of {}", from, msg.location());
        }

        Self {
            email: bare_address(&from).to_owned(),
            from: clean(&from),
            subject: clean(&msg.header_or_empty("Subject")),
            date: clean(&msg.header_or_empty("Date")),
        }
    }

    pub fn to_tsv(&self) -> String {
        [
            self.from.as_str(),
            self.email.as_str(),
            &self.subject,
            &self.date,
        ]
        .join("\t")
    }
}

/// Extracts the address between angle brackets, or returns the whole
/// value when there are none.
pub fn bare_address(from: &str) -> &str {
    match (from.find('<'), from.find('>')) {
        (Some(begin), Some(end)) if begin < end => &from[begin + 1..end],
        _ => from,
    }
}

/// Writes the export file, header row first.
pub fn write_export<'a, P, R>(path: P, rows: R) -> Result<()>
where
    P: AsRef<Path>,
    R: IntoIterator<Item = &'a ExportRow>,
{
    let path = path.as_ref();
    file::write_atomically(path, |file| {
        writeln!(file, "{}", EXPORT_HEADER)?;
        for row in rows {
            writeln!(file, "{}", row.to_tsv())?;
        }
        Ok(())
    })
    .map_err(|err| Error::WriteExportError(err, path.to_owned()))
}

// tabs and line breaks would break the row layout
fn clean(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use crate::Message;

    use super::{bare_address, ExportRow};

    #[test]
    fn extract_bare_address() {
        assert_eq!("alice@localhost", bare_address("Alice <alice@localhost>"));
        assert_eq!("alice@localhost", bare_address("alice@localhost"));
        assert_eq!("Alice >x<", bare_address("Alice >x<"));
    }

    #[test]
    fn row_from_message() {
        let raw = "From: Alice <alice@localhost>\r\nSubject: Hi\r\nDate: D1\r\n\r\n";
        let msg = Message::parse("INBOX", 1, raw.as_bytes().to_vec()).unwrap();
        let row = ExportRow::from_message(&msg);

        assert_eq!(
            "Alice <alice@localhost>\talice@localhost\tHi\tD1",
            row.to_tsv()
        );
    }
}
