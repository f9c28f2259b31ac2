// imap-dedup, a Rust tool for finding duplicate emails over IMAP.
// Copyright (C) 2022  soywod <clement.douin@posteo.net>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Identity module.
//!
//! This module computes the key used to decide whether two messages
//! are duplicates: either the Message-ID header, or a checksum of a
//! fixed set of headers. Two messages are duplicates if and only if
//! their identities are equal strings.

use log::{trace, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tiny_keccak::{Hasher, Sha3};

use super::Message;

/// Headers covered by the checksum, in hashing order.
pub const CHECKSUM_HEADERS: [&str; 6] = ["From", "To", "Subject", "Date", "Cc", "Bcc"];

/// Separator between the hex digests of a checksum identity.
pub const CHECKSUM_SEPARATOR: &str = "|";

/// Represents the duplicate detection key of a message.
#[derive(Debug, Clone, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Represents the way identities are computed.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum IdentityMode {
    /// Uses the Message-ID header. Messages without one are never
    /// considered duplicates.
    #[default]
    MessageId,
    /// Uses a checksum of the From, To, Subject, Date, Cc and Bcc
    /// headers, optionally including the Message-ID.
    Checksum { include_message_id: bool },
}

impl IdentityMode {
    /// Computes the identity of the given message. Returns `None`
    /// when the message cannot be identified.
    pub fn compute(&self, msg: &Message) -> Option<Identity> {
        match self {
            Self::MessageId => message_id(msg),
            Self::Checksum { include_message_id } => Some(checksum(msg, *include_message_id)),
        }
    }
}

fn message_id(msg: &Message) -> Option<Identity> {
    let id = msg.header_or_empty("Message-ID");
    let id = id.trim_start();

    if id.is_empty() {
        warn!(
            "message {:?} dated {:?} has no Message-ID header, consider using the checksum mode",
            msg.header_or_empty("Subject"),
            msg.header_or_empty("Date"),
        );
        return None;
    }

    Some(Identity::from(id))
}

fn checksum(msg: &Message, include_message_id: bool) -> Identity {
    let mut digests = Digests::new();

    for name in CHECKSUM_HEADERS {
        // field-prefixed so that moving a value from one header to
        // another changes the digest
        digests.update(format!("{}:{}", name, msg.header_or_empty(name)).as_bytes());
    }

    if include_message_id {
        digests.update(format!("Message-ID:{}", msg.header_or_empty("Message-ID")).as_bytes());
    }

    let id = digests.finalize();
    trace!("checksum of {}: {}", msg.location(), id);
    Identity(id)
}

/// Feeds the same input to the three digests.
// TODO: measure whether a single sha256 would be enough, three
// digests triple the hashing cost of large folders
struct Digests {
    md5: md5::Context,
    sha2: Sha256,
    sha3: Sha3,
}

impl Digests {
    fn new() -> Self {
        Self {
            md5: md5::Context::new(),
            sha2: Sha256::new(),
            sha3: Sha3::v256(),
        }
    }

    fn update(&mut self, data: &[u8]) {
        self.md5.consume(data);
        Digest::update(&mut self.sha2, data);
        Hasher::update(&mut self.sha3, data);
    }

    fn finalize(self) -> String {
        let md5 = format!("{:x}", self.md5.compute());
        let sha2 = format!("{:x}", self.sha2.finalize());

        let mut sha3 = [0u8; 32];
        self.sha3.finalize(&mut sha3);
        let sha3: String = sha3.iter().map(|b| format!("{:02x}", b)).collect();

        [md5, sha2, sha3].join(CHECKSUM_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use crate::Message;

    use super::{Identity, IdentityMode, CHECKSUM_HEADERS};

    const CHECKSUM: IdentityMode = IdentityMode::Checksum {
        include_message_id: false,
    };
    const CHECKSUM_WITH_ID: IdentityMode = IdentityMode::Checksum {
        include_message_id: true,
    };

    fn msg(headers: &[(&str, &str)]) -> Message {
        let mut raw = String::new();
        for (key, val) in headers {
            raw.push_str(&format!("{}: {}\r\n", key, val));
        }
        raw.push_str("\r\n");
        Message::parse("INBOX", 1, raw.into_bytes()).unwrap()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("From", "a@x"),
            ("To", "b@x"),
            ("Cc", "c@x"),
            ("Bcc", "d@x"),
            ("Subject", "hi"),
            ("Date", "Mon, 1 Feb 2021 10:00:00 +0000"),
            ("Message-ID", "<abc@x>"),
        ]
    }

    fn with(name: &str, val: &'static str) -> Vec<(&'static str, &'static str)> {
        base()
            .into_iter()
            .map(|(k, v)| if k == name { (k, val) } else { (k, v) })
            .collect()
    }

    #[test]
    fn message_id_mode() {
        let id = IdentityMode::MessageId.compute(&msg(&base()));
        assert_eq!(Some(Identity::from("<abc@x>")), id);

        let id = IdentityMode::MessageId.compute(&msg(&with("Message-ID", "   <abc@x>")));
        assert_eq!(Some(Identity::from("<abc@x>")), id);

        let headers: Vec<_> = base()
            .into_iter()
            .filter(|(k, _)| *k != "Message-ID")
            .collect();
        assert_eq!(None, IdentityMode::MessageId.compute(&msg(&headers)));
    }

    #[test]
    fn checksum_is_deterministic() {
        let a = CHECKSUM.compute(&msg(&base())).unwrap();
        let b = CHECKSUM.compute(&msg(&base())).unwrap();
        assert_eq!(a, b);

        let parts: Vec<_> = a.as_str().split('|').collect();
        assert_eq!(3, parts.len());
        assert_eq!(32, parts[0].len());
        assert_eq!(64, parts[1].len());
        assert_eq!(64, parts[2].len());
    }

    #[test]
    fn checksum_is_sensitive_to_covered_headers() {
        let base_id = CHECKSUM.compute(&msg(&base())).unwrap();

        for name in CHECKSUM_HEADERS {
            let id = CHECKSUM.compute(&msg(&with(name, "changed"))).unwrap();
            assert_ne!(base_id, id, "changing {} should change the checksum", name);
        }
    }

    #[test]
    fn checksum_message_id_sensitivity() {
        let changed = with("Message-ID", "<other@x>");

        assert_eq!(
            CHECKSUM.compute(&msg(&base())),
            CHECKSUM.compute(&msg(&changed)),
        );
        assert_ne!(
            CHECKSUM_WITH_ID.compute(&msg(&base())),
            CHECKSUM_WITH_ID.compute(&msg(&changed)),
        );
        assert_ne!(
            CHECKSUM.compute(&msg(&base())),
            CHECKSUM_WITH_ID.compute(&msg(&base())),
        );
    }

    #[test]
    fn checksum_is_field_prefixed() {
        // same concatenated values, different fields
        let a = msg(&[("From", "ab"), ("To", "")]);
        let b = msg(&[("From", "a"), ("To", "b")]);
        assert_ne!(CHECKSUM.compute(&a), CHECKSUM.compute(&b));
    }

    #[test]
    fn checksum_without_message_id_still_identifies() {
        let headers = [("From", "a@x"), ("Subject", "hi")];
        assert!(CHECKSUM.compute(&msg(&headers)).is_some());
    }

    #[test]
    fn checksum_date_only_difference() {
        let a = msg(&[("From", "a@x"), ("To", "b@x"), ("Subject", "hi"), ("Date", "D1")]);
        let b = msg(&[("From", "a@x"), ("To", "b@x"), ("Subject", "hi"), ("Date", "D2")]);
        assert_ne!(CHECKSUM.compute(&a), CHECKSUM.compute(&b));
    }
}
