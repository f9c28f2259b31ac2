//! Message module.
//!
//! This module contains the representation of a fetched message: its
//! location and its header block. Only headers are ever fetched.

use log::trace;
use mailparse::{MailHeader, MailHeaderMap};

use super::{header, Error, Result};

/// Represents a message fetched from a folder.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Message {
    /// Represents the message sequence number. It is only meaningful
    /// within the folder and the session it was fetched from.
    pub seq: u32,
    /// Represents the folder the message was fetched from.
    pub folder: String,
    /// Represents the raw header block.
    pub raw: Vec<u8>,
    headers: Vec<(String, Vec<u8>)>,
}

impl Message {
    /// Parses the raw header block of the message.
    pub fn parse<F: ToString>(folder: F, seq: u32, raw: Vec<u8>) -> Result<Self> {
        let folder = folder.to_string();

        let (parsed, _) = mailparse::parse_headers(&raw)
            .map_err(|err| Error::ParseHeadersError(err, folder.clone(), seq))?;
        let headers = parsed.iter().map(raw_header).collect();
        trace!("headers of message {}: {:?}", seq, parsed.get_first_value("Subject"));

        Ok(Self {
            seq,
            folder,
            raw,
            headers,
        })
    }

    /// Returns the decoded value of the first header matching the
    /// given name (case insensitive), or `None` when absent.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| header::decode(value))
    }

    /// Same as [`Message::header`], with an absent header decoded as
    /// an empty string.
    pub fn header_or_empty(&self, name: &str) -> String {
        self.header(name).unwrap_or_default()
    }

    /// Renders the location of the message as `folder:seq`.
    pub fn location(&self) -> String {
        format!("{}:{}", self.folder, self.seq)
    }
}

fn raw_header(header: &MailHeader) -> (String, Vec<u8>) {
    (header.get_key(), header.get_value_raw().to_vec())
}
