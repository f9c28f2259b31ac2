//! IMAP handshake module.
//!
//! This module contains the exchanges happening before the IMAP client
//! takes over the stream: the server greeting, the capability query
//! and the STARTTLS upgrade. Responses are parsed with `imap-proto`.

use imap_proto::{Capability, RequestId, Response, ResponseCode, Status};
use log::{debug, trace};
use std::{
    io::{self, Cursor, Read, Write},
    result,
};
use thiserror::Error;

const CAPABILITY_TAG: &str = "s1";
const STARTTLS_TAG: &str = "s2";
const MAX_LINE_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read imap server response")]
    ReadResponseError(#[source] io::Error),
    #[error("cannot read imap server response: line too long")]
    ResponseTooLongError,
    #[error("cannot send imap command {1}")]
    WriteCommandError(#[source] io::Error, String),
    #[error("cannot parse imap server greeting {0:?}")]
    ParseGreetingError(String),
    #[error("cannot connect to imap server: {0}")]
    GreetingRejectedError(String),
    #[error("cannot start tls: {0}")]
    StartTlsRejectedError(String),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the server greeting.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Greeting {
    /// The connection starts in the authenticated state.
    pub preauth: bool,
    /// Capabilities advertised in the greeting, if any.
    pub capabilities: Option<Vec<String>>,
}

impl Greeting {
    pub fn read<S: Read>(stream: &mut S) -> Result<Self> {
        let line = read_line(stream)?;
        trace!("imap greeting: {:?}", String::from_utf8_lossy(&line));
        Self::parse(&line)
    }

    pub fn parse(line: &[u8]) -> Result<Self> {
        let (status, code, information) = match Response::from_bytes(line) {
            Ok((
                _,
                Response::Data {
                    status,
                    code,
                    information,
                },
            )) => (status, code, information),
            _ => {
                let line = String::from_utf8_lossy(line).trim_end().to_owned();
                return Err(Error::ParseGreetingError(line));
            }
        };

        let capabilities = match code {
            Some(ResponseCode::Capabilities(caps)) => Some(capability_names(&caps)),
            _ => None,
        };

        match status {
            Status::Ok => Ok(Self {
                preauth: false,
                capabilities,
            }),
            Status::PreAuth => Ok(Self {
                preauth: true,
                capabilities,
            }),
            _ => Err(Error::GreetingRejectedError(
                information.map(|info| info.into_owned()).unwrap_or_default(),
            )),
        }
    }
}

/// Returns the server capabilities, upper-cased. They come from the
/// greeting when advertised there, otherwise from a CAPABILITY
/// command.
pub fn capabilities<S: Read + Write>(stream: &mut S, greeting: &Greeting) -> Result<Vec<String>> {
    if let Some(caps) = greeting.capabilities.as_ref() {
        return Ok(caps.clone());
    }

    let (status, info, untagged) = run(stream, CAPABILITY_TAG, "CAPABILITY")?;
    if status != Status::Ok {
        debug!("cannot get imap server capabilities: {}", info);
        return Ok(Vec::new());
    }

    let caps = untagged
        .iter()
        .filter_map(|res| match res {
            Response::Capabilities(caps) => Some(capability_names(caps)),
            _ => None,
        })
        .flatten()
        .collect();

    Ok(caps)
}

/// Sends STARTTLS. The TLS handshake can start once this returns.
pub fn starttls<S: Read + Write>(stream: &mut S) -> Result<()> {
    let (status, info, _) = run(stream, STARTTLS_TAG, "STARTTLS")?;
    match status {
        Status::Ok => Ok(()),
        _ => Err(Error::StartTlsRejectedError(info)),
    }
}

/// Reads one response line, CRLF included. Bytes are read one at a
/// time so nothing after the line is consumed.
pub fn read_line<S: Read>(stream: &mut S) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    let mut byte = [0; 1];

    while !line.ends_with(b"\r\n") {
        if line.len() >= MAX_LINE_LEN {
            return Err(Error::ResponseTooLongError);
        }
        stream
            .read_exact(&mut byte)
            .map_err(Error::ReadResponseError)?;
        line.push(byte[0]);
    }

    Ok(line)
}

fn run<S: Read + Write>(
    stream: &mut S,
    tag: &str,
    cmd: &str,
) -> Result<(Status, String, Vec<Response<'static>>)> {
    debug!("imap handshake command: {} {}", tag, cmd);
    stream
        .write_all(format!("{} {}\r\n", tag, cmd).as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|err| Error::WriteCommandError(err, cmd.to_owned()))?;

    let mut untagged = Vec::new();
    loop {
        let line = read_line(stream)?;
        match Response::from_bytes(&line) {
            Ok((
                _,
                Response::Done {
                    tag: RequestId(done_tag),
                    status,
                    information,
                    ..
                },
            )) if done_tag == tag => {
                let info = information.map(|info| info.into_owned()).unwrap_or_default();
                return Ok((status, info, untagged));
            }
            Ok((_, res)) => untagged.push(res.into_owned()),
            Err(_) => trace!("skipping imap response {:?}", String::from_utf8_lossy(&line)),
        }
    }
}

fn capability_names(caps: &[Capability]) -> Vec<String> {
    caps.iter()
        .map(|cap| match cap {
            Capability::Imap4rev1 => String::from("IMAP4REV1"),
            Capability::Auth(mechanism) => format!("AUTH={}", mechanism.to_uppercase()),
            Capability::Atom(atom) => atom.to_uppercase(),
        })
        .collect()
}

/// Wraps the stream of a preauthenticated connection.
///
/// The IMAP client only hands out a session after a login, so the
/// first command written is held back and answered here with a tagged
/// OK. It never reaches the server.
pub struct PreauthStream<S> {
    inner: S,
    intercept: bool,
    command: Vec<u8>,
    reply: Cursor<Vec<u8>>,
}

impl<S> PreauthStream<S> {
    pub fn new(inner: S, preauth: bool) -> Self {
        Self {
            inner,
            intercept: preauth,
            command: Vec::new(),
            reply: Cursor::new(Vec::new()),
        }
    }

    fn has_reply(&self) -> bool {
        (self.reply.position() as usize) < self.reply.get_ref().len()
    }
}

impl<S: Read> Read for PreauthStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.has_reply() {
            return self.reply.read(buf);
        }
        self.inner.read(buf)
    }
}

impl<S: Write> Write for PreauthStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.intercept {
            return self.inner.write(buf);
        }

        self.command.extend_from_slice(buf);
        if self.command.ends_with(b"\r\n") {
            let tag = self
                .command
                .split(|b| *b == b' ')
                .next()
                .unwrap_or_default();
            let mut reply = tag.to_vec();
            reply.extend_from_slice(b" OK preauthenticated\r\n");

            self.reply = Cursor::new(reply);
            self.command.clear();
            self.intercept = false;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.intercept {
            return Ok(());
        }
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Read, Write};

    use super::{capabilities, starttls, Error, Greeting, PreauthStream};

    /// Replays a scripted server output and records the client input.
    #[derive(Default)]
    struct ScriptedStream {
        output: Cursor<Vec<u8>>,
        input: Vec<u8>,
    }

    impl ScriptedStream {
        fn new(output: &str) -> Self {
            Self {
                output: Cursor::new(output.as_bytes().to_vec()),
                input: Vec::new(),
            }
        }

        fn input(&self) -> String {
            String::from_utf8_lossy(&self.input).into_owned()
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.output.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.input.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn greeting_with_capabilities() {
        let greeting =
            Greeting::parse(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n")
                .unwrap();
        assert!(!greeting.preauth);
        assert_eq!(
            Some(vec![
                String::from("IMAP4REV1"),
                String::from("STARTTLS"),
                String::from("LOGINDISABLED"),
            ]),
            greeting.capabilities
        );
    }

    #[test]
    fn preauth_greeting() {
        let greeting = Greeting::parse(b"* PREAUTH ready\r\n").unwrap();
        assert!(greeting.preauth);
        assert_eq!(None, greeting.capabilities);
    }

    #[test]
    fn rejected_greeting() {
        assert!(matches!(
            Greeting::parse(b"* BYE too many connections\r\n"),
            Err(Error::GreetingRejectedError(info)) if info == "too many connections"
        ));
        assert!(matches!(
            Greeting::parse(b"hello\r\n"),
            Err(Error::ParseGreetingError(_))
        ));
    }

    #[test]
    fn capabilities_from_command() {
        let mut stream = ScriptedStream::new(
            "* CAPABILITY IMAP4rev1 STARTTLS AUTH=plain\r\ns1 OK done\r\n",
        );
        let greeting = Greeting::read(&mut ScriptedStream::new("* OK ready\r\n")).unwrap();

        let caps = capabilities(&mut stream, &greeting).unwrap();
        assert_eq!(vec!["IMAP4REV1", "STARTTLS", "AUTH=PLAIN"], caps);
        assert_eq!("s1 CAPABILITY\r\n", stream.input());
    }

    #[test]
    fn capabilities_from_greeting() {
        let mut stream = ScriptedStream::default();
        let greeting = Greeting::parse(b"* OK [CAPABILITY IMAP4rev1] ready\r\n").unwrap();

        assert_eq!(vec!["IMAP4REV1"], capabilities(&mut stream, &greeting).unwrap());
        assert_eq!("", stream.input());
    }

    #[test]
    fn starttls_command() {
        let mut stream = ScriptedStream::new("s2 OK begin tls\r\n");
        starttls(&mut stream).unwrap();
        assert_eq!("s2 STARTTLS\r\n", stream.input());

        let mut stream = ScriptedStream::new("s2 BAD not now\r\n");
        assert!(matches!(
            starttls(&mut stream),
            Err(Error::StartTlsRejectedError(info)) if info == "not now"
        ));
    }

    #[test]
    fn preauth_stream_answers_first_command() {
        let inner = ScriptedStream::new("* LIST () \"/\" INBOX\r\na2 OK done\r\n");
        let mut stream = PreauthStream::new(inner, true);

        stream.write_all(b"a1 LOGIN \"\" \"\"").unwrap();
        stream.write_all(b"\r\n").unwrap();
        stream.flush().unwrap();

        let mut reply = [0; 64];
        let n = stream.read(&mut reply).unwrap();
        assert_eq!(b"a1 OK preauthenticated\r\n", &reply[..n]);

        stream.write_all(b"a2 LIST \"\" \"*\"\r\n").unwrap();
        let mut rest = String::new();
        stream.read_to_string(&mut rest).unwrap();
        assert_eq!("* LIST () \"/\" INBOX\r\na2 OK done\r\n", rest);
        assert_eq!("a2 LIST \"\" \"*\"\r\n", stream.inner.input());
    }

    #[test]
    fn plain_stream_passes_through() {
        let mut stream = PreauthStream::new(ScriptedStream::new("a1 OK\r\n"), false);
        stream.write_all(b"a1 LOGIN me secret\r\n").unwrap();

        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        assert_eq!("a1 OK\r\n", reply);
        assert_eq!("a1 LOGIN me secret\r\n", stream.inner.input());
    }
}
