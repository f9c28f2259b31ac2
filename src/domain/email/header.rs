//! Header module.
//!
//! This module turns raw header values into text. A raw value is
//! first decomposed into fragments (RFC 2047 encoded words and the
//! plain runs between them), each fragment carrying the charset it
//! declares. Fragments are then decoded one by one and concatenated
//! in their original order.
//!
//! Decoding never fails: unknown charsets, broken encoded words and
//! stray 8-bit bytes all degrade to a best-effort UTF-8 reading.

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use log::{debug, trace, warn};
use regex::bytes::Regex;
use std::borrow::Cow;

/// Charset sentinel for raw 8-bit bytes found outside of any encoded
/// word.
pub const UNKNOWN_8BIT: &str = "unknown-8bit";

/// Multi-byte UTF-8 sequences commonly found in headers. They only
/// serve the unknown-8bit diagnostic.
const COMMON_UTF8: [&[u8]; 11] = [
    b"\xe2\x80\x99",     // apostrophe
    b"\xe2\x80\xa6",     // ellipsis
    b"\xe2\x80\x94",     // dash
    b"\xe2\x80\x8b",     // zero width space
    b"\xc2\xa0",         // nbsp
    b"\xc2\xae",         // registered trademark
    b"\xe2\xad\x90",     // star emoji
    b"\xe2\x9c\xa8",     // sparkle emoji
    b"\xf0\x9f\x94\xa5", // fire emoji
    b"\xf0\x9f\x92\x8e", // diamond emoji
    b"\xf0\x9f\x8d\xb7", // wine emoji
];

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"=\?([^?\s]+)\?([bBqQ])\?([^?\s]*)\?=").unwrap();
}

/// Represents one piece of a decomposed header value.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Fragment<'a> {
    /// Text that needs no decoding.
    Text(Cow<'a, str>),
    /// Bytes to decode with the given charset, UTF-8 when absent.
    Encoded {
        bytes: Cow<'a, [u8]>,
        charset: Option<String>,
    },
}

/// Decodes a raw header value into text.
pub fn decode(raw: &[u8]) -> String {
    decode_fragments(&split(raw))
}

/// Decomposes a raw header value into fragments.
///
/// Folding line breaks are removed first. Whitespace separating two
/// adjacent encoded words is dropped, as RFC 2047 requires.
pub fn split(raw: &[u8]) -> Vec<Fragment<'static>> {
    let raw = unfold(raw);
    let mut fragments = Vec::new();
    let mut cursor = 0;
    let mut prev_encoded = false;

    for captures in ENCODED_WORD.captures_iter(&raw) {
        // group 0 always exists on a match
        let word = match captures.get(0) {
            Some(word) => word,
            None => continue,
        };

        let between = &raw[cursor..word.start()];
        let blank = between.iter().all(u8::is_ascii_whitespace);
        if !between.is_empty() && !(prev_encoded && blank) {
            fragments.push(plain_fragment(between));
        }

        let charset = captures
            .get(1)
            .map(|m| String::from_utf8_lossy(m.as_bytes()))
            .unwrap_or_default();
        // RFC 2231 language suffix: =?charset*lang?...
        let charset = charset.split('*').next().unwrap_or_default().to_owned();
        let xfer = captures.get(2).map(|m| m.as_bytes()).unwrap_or_default();
        let content = captures.get(3).map(|m| m.as_bytes()).unwrap_or_default();

        match decode_xfer(xfer, content) {
            Some(bytes) => {
                fragments.push(Fragment::Encoded {
                    bytes: Cow::Owned(bytes),
                    charset: Some(charset),
                });
                prev_encoded = true;
            }
            None => {
                debug!("cannot decode encoded word, keeping it verbatim");
                fragments.push(plain_fragment(word.as_bytes()));
                prev_encoded = false;
            }
        }

        cursor = word.end();
    }

    if cursor < raw.len() {
        fragments.push(plain_fragment(&raw[cursor..]));
    }

    // fragments borrow from the unfolded copy, detach them
    fragments.into_iter().map(Fragment::into_owned).collect()
}

/// Decodes fragments and concatenates them in order.
pub fn decode_fragments(fragments: &[Fragment]) -> String {
    let mut decoded = String::new();

    for fragment in fragments {
        match fragment {
            Fragment::Text(text) => decoded.push_str(text),
            Fragment::Encoded { bytes, charset } => {
                decoded.push_str(&decode_fragment(bytes, charset.as_deref()))
            }
        }
    }

    if fragments.len() > 1 && has_foreign_charset(fragments) {
        trace!("{} fragments decoded to {:?}", fragments.len(), decoded);
    }

    decoded
}

fn decode_fragment(bytes: &[u8], charset: Option<&str>) -> String {
    match charset {
        Some(charset) if charset.eq_ignore_ascii_case(UNKNOWN_8BIT) => {
            let decoded = String::from_utf8_lossy(bytes).into_owned();
            if !bytes.is_ascii() && !has_common_utf8(bytes) {
                warn!("found unknown-8bit encoding: {:?}", bytes);
                warn!("decoded as utf-8: {}", decoded);
            }
            decoded
        }
        Some(charset) => match Encoding::for_label(charset.as_bytes()) {
            Some(encoding) => encoding.decode_with_bom_removal(bytes).0.into_owned(),
            None => {
                debug!("unknown charset {:?}, falling back to utf-8", charset);
                String::from_utf8_lossy(bytes).into_owned()
            }
        },
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn plain_fragment(bytes: &[u8]) -> Fragment<'_> {
    if bytes.is_ascii() {
        // ascii is valid utf-8
        Fragment::Text(String::from_utf8_lossy(bytes))
    } else {
        Fragment::Encoded {
            bytes: Cow::Borrowed(bytes),
            charset: Some(UNKNOWN_8BIT.to_owned()),
        }
    }
}

fn unfold(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .copied()
        .filter(|b| *b != b'\r' && *b != b'\n')
        .collect()
}

fn decode_xfer(xfer: &[u8], content: &[u8]) -> Option<Vec<u8>> {
    match xfer {
        b"q" | b"Q" => Some(q_decode(content)),
        b"b" | b"B" => base64::decode(content).ok(),
        _ => None,
    }
}

/// Decodes the "Q" encoding: `_` stands for a space, `=XX` for the
/// byte XX. Malformed escapes are kept as is.
fn q_decode(content: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::with_capacity(content.len());
    let mut i = 0;

    while i < content.len() {
        match content[i] {
            b'_' => decoded.push(b' '),
            b'=' => {
                let hex = content.get(i + 1..i + 3).and_then(|hex| {
                    std::str::from_utf8(hex)
                        .ok()
                        .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                });
                match hex {
                    Some(byte) => {
                        decoded.push(byte);
                        i += 2;
                    }
                    None => decoded.push(b'='),
                }
            }
            b => decoded.push(b),
        }
        i += 1;
    }

    decoded
}

fn has_common_utf8(bytes: &[u8]) -> bool {
    COMMON_UTF8
        .iter()
        .any(|seq| bytes.windows(seq.len()).any(|window| window == *seq))
}

fn has_foreign_charset(fragments: &[Fragment]) -> bool {
    fragments.iter().any(|fragment| match fragment {
        Fragment::Encoded {
            charset: Some(charset),
            ..
        } => !charset.eq_ignore_ascii_case("utf-8"),
        _ => false,
    })
}

impl Fragment<'_> {
    pub fn into_owned(self) -> Fragment<'static> {
        match self {
            Fragment::Text(text) => Fragment::Text(Cow::Owned(text.into_owned())),
            Fragment::Encoded { bytes, charset } => Fragment::Encoded {
                bytes: Cow::Owned(bytes.into_owned()),
                charset,
            },
        }
    }
}
