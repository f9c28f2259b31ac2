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

//! IMAP backend module.
//!
//! This module contains the definition of the IMAP backend: one
//! authenticated session, kept for the whole run.

use imap_proto::NameAttribute;
use log::{debug, log_enabled, trace, warn, Level};
use native_tls::{HandshakeError, TlsConnector, TlsStream};
use std::{
    io::{self, Read, Write},
    net::TcpStream,
    process::{Child, ChildStdin, ChildStdout, Stdio},
    result,
};
use thiserror::Error;
use utf7_imap::{decode_utf7_imap as decode_utf7, encode_utf7_imap as encode_utf7};

use super::handshake::{self, Greeting, PreauthStream};
use crate::{
    backend::{self, to_sequence_set, Backend, SearchQuery},
    process, Flags, Folder, Folders, ImapConfig, Security,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot create tls connector")]
    CreateTlsConnectorError(#[source] native_tls::Error),
    #[error("cannot connect to imap server {1}:{2}")]
    ConnectImapServerError(#[source] io::Error, String, u16),
    #[error("cannot establish tls session with imap server {1}")]
    TlsHandshakeError(#[source] HandshakeError<TcpStream>, String),
    #[error("cannot start tls: imap server {0} does not offer starttls")]
    StartTlsNotOfferedError(String),
    #[error("cannot spawn imap process")]
    SpawnImapProcessError(#[source] process::Error),
    #[error("cannot get standard streams of imap process")]
    GetImapProcessStreamsError,
    #[error("cannot login to imap server")]
    LoginImapServerError(#[source] imap::Error),
    #[error("cannot authenticate to imap server as {1}")]
    AuthenticateImapServerError(#[source] imap::Error, String),

    #[error("cannot list folders matching {2} from {1}")]
    ListFoldersError(#[source] imap::Error, String, String),
    #[error("cannot select folder {1}")]
    SelectFolderError(#[source] imap::Error, String),
    #[error("cannot search messages with query: {1}")]
    SearchMsgsError(#[source] imap::Error, String),
    #[error("cannot fetch headers of messages {1}")]
    FetchHeadersError(#[source] imap::Error, String),
    #[error("cannot copy email(s) {1} to {2}")]
    CopyEmailError(#[source] imap::Error, String, String),
    #[error("cannot add flags {1} to message(s) {2}")]
    AddFlagsError(#[source] imap::Error, String, String),
    #[error("cannot close folder {1}")]
    CloseFolderError(#[source] imap::Error, String),
    #[error("cannot logout from imap server")]
    LogoutError(#[source] imap::Error),

    #[error(transparent)]
    HandshakeError(#[from] handshake::Error),
    #[error(transparent)]
    ImapConfigError(#[from] backend::imap::config::Error),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the standard streams of the IMAP process transport.
pub struct ProcessStream {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl ProcessStream {
    fn spawn(cmd: &str) -> Result<Self> {
        let mut child = process::spawn(cmd, Stdio::inherit()).map_err(Error::SpawnImapProcessError)?;
        let stdin = child.stdin.take().ok_or(Error::GetImapProcessStreamsError)?;
        let stdout = child.stdout.take().ok_or(Error::GetImapProcessStreamsError)?;

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }
}

impl Read for ProcessStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl Write for ProcessStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdin.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdin.flush()
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if let Err(err) = self.child.kill() {
            trace!("cannot kill imap process: {}", err);
        }
        if let Err(err) = self.child.wait() {
            trace!("cannot wait for imap process: {}", err);
        }
    }
}

pub enum ImapSessionStream {
    Tls(TlsStream<TcpStream>),
    Tcp(TcpStream),
    Process(ProcessStream),
}

impl Read for ImapSessionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tls(stream) => stream.read(buf),
            Self::Tcp(stream) => stream.read(buf),
            Self::Process(stream) => stream.read(buf),
        }
    }
}

impl Write for ImapSessionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tls(stream) => stream.write(buf),
            Self::Tcp(stream) => stream.write(buf),
            Self::Process(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tls(stream) => stream.flush(),
            Self::Tcp(stream) => stream.flush(),
            Self::Process(stream) => stream.flush(),
        }
    }
}

pub type ImapSession = imap::Session<PreauthStream<ImapSessionStream>>;

/// SASL PLAIN authenticator, used when an admin user authenticates on
/// behalf of another user.
struct PlainAuthenticator<'a> {
    user: &'a str,
    auth_user: &'a str,
    passwd: &'a str,
}

impl imap::Authenticator for PlainAuthenticator<'_> {
    type Response = String;

    fn process(&self, _challenge: &[u8]) -> Self::Response {
        format!("{}\x00{}\x00{}", self.user, self.auth_user, self.passwd)
    }
}

pub struct ImapBackend {
    session: ImapSession,
    selected: Option<String>,
}

impl ImapBackend {
    /// Connects and authenticates to the IMAP server. A preauthenticated
    /// connection needs no password.
    pub fn new(config: &ImapConfig) -> Result<Self> {
        let (stream, greeting) = Self::connect(config)?;
        let client = imap::Client::new(PreauthStream::new(stream, greeting.preauth));

        let mut session = if greeting.preauth {
            debug!("connection preauthenticated, skipping login");
            client
                .login(&config.login, "")
                .map_err(|res| Error::LoginImapServerError(res.0))?
        } else {
            let passwd = config.passwd()?;
            match config.auth_user.as_deref() {
                Some(auth_user) => {
                    debug!("authenticating as {} on behalf of {}", auth_user, config.login);
                    let authenticator = PlainAuthenticator {
                        user: &config.login,
                        auth_user,
                        passwd: &passwd,
                    };
                    client
                        .authenticate("PLAIN", &authenticator)
                        .map_err(|res| Error::AuthenticateImapServerError(res.0, auth_user.to_owned()))?
                }
                None => client
                    .login(&config.login, &passwd)
                    .map_err(|res| Error::LoginImapServerError(res.0))?,
            }
        };
        session.debug = log_enabled!(Level::Trace);

        Ok(Self {
            session,
            selected: None,
        })
    }

    /// Opens the transport and reads the server greeting, upgrading
    /// plain connections with STARTTLS when possible.
    fn connect(config: &ImapConfig) -> Result<(ImapSessionStream, Greeting)> {
        if let Some(cmd) = config.process_cmd.as_deref() {
            debug!("connecting through process {:?}", cmd);
            let mut stream = ProcessStream::spawn(cmd)?;
            let greeting = Greeting::read(&mut stream)?;
            return Ok((ImapSessionStream::Process(stream), greeting));
        }

        let host = config.host.as_str();
        let port = config.port();
        debug!("connecting to {}:{}", host, port);

        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(config.insecure())
            .danger_accept_invalid_hostnames(config.insecure())
            .build()
            .map_err(Error::CreateTlsConnectorError)?;

        let mut tcp = TcpStream::connect((host, port))
            .map_err(|err| Error::ConnectImapServerError(err, host.to_owned(), port))?;

        let security = config.security();
        if security == Security::Tls {
            let mut tls = connector
                .connect(host, tcp)
                .map_err(|err| Error::TlsHandshakeError(err, host.to_owned()))?;
            let greeting = Greeting::read(&mut tls)?;
            return Ok((ImapSessionStream::Tls(tls), greeting));
        }

        let greeting = Greeting::read(&mut tcp)?;
        if greeting.preauth {
            // STARTTLS is only valid before authentication
            if security == Security::StartTls {
                return Err(Error::StartTlsNotOfferedError(host.to_owned()));
            }
            warn!("unencrypted preauthenticated connection to {}:{}", host, port);
            return Ok((ImapSessionStream::Tcp(tcp), greeting));
        }

        let caps = handshake::capabilities(&mut tcp, &greeting)?;
        trace!("imap capabilities: {:?}", caps);

        if caps.iter().any(|cap| cap == "STARTTLS") {
            debug!("upgrading connection to {}:{} with starttls", host, port);
            handshake::starttls(&mut tcp)?;
            let tls = connector
                .connect(host, tcp)
                .map_err(|err| Error::TlsHandshakeError(err, host.to_owned()))?;
            return Ok((ImapSessionStream::Tls(tls), greeting));
        }

        if security == Security::StartTls {
            return Err(Error::StartTlsNotOfferedError(host.to_owned()));
        }

        warn!("unencrypted connection to {}:{}, starttls not offered", host, port);
        Ok((ImapSessionStream::Tcp(tcp), greeting))
    }

    fn list(&mut self, reference: &str, pattern: &str) -> Result<Folders> {
        let reference = encode_utf7(reference.to_owned());
        let pattern = quote(&encode_utf7(pattern.to_owned()));
        debug!("list folders: reference {:?}, pattern {}", reference, pattern);

        let names = self
            .session
            .list(Some(&reference), Some(&pattern))
            .map_err(|err| Error::ListFoldersError(err, reference.clone(), pattern.clone()))?;

        let folders = Folders::from_iter(names.iter().map(|name| Folder {
            delim: name.delimiter().map(ToOwned::to_owned),
            name: decode_utf7(name.name().into()),
            attributes: name.attributes().iter().map(attribute_name).collect(),
        }));

        trace!("imap folders: {:?}", folders);
        Ok(folders)
    }

    fn fetch(&mut self, seqs: &[u32]) -> Result<Vec<(u32, Vec<u8>)>> {
        if seqs.is_empty() {
            return Ok(Vec::new());
        }

        let range = to_sequence_set(seqs);
        let fetches = self
            .session
            .fetch(&range, "RFC822.HEADER")
            .map_err(|err| Error::FetchHeadersError(err, range.clone()))?;

        let mut headers: Vec<(u32, Vec<u8>)> = Vec::with_capacity(seqs.len());
        for fetch in fetches.iter() {
            match fetch.header() {
                Some(header) if seqs.contains(&fetch.message) => {
                    headers.push((fetch.message, header.to_vec()))
                }
                _ => trace!("skipping fetch response of message {}", fetch.message),
            }
        }

        if headers.len() != seqs.len() {
            warn!(
                "requested headers of {} message(s), received {}",
                seqs.len(),
                headers.len()
            );
        }

        headers.sort_by_key(|(seq, _)| *seq);
        Ok(headers)
    }
}

impl Backend for ImapBackend {
    fn list_folders(&mut self, reference: &str, pattern: &str) -> backend::Result<Folders> {
        Ok(self.list(reference, pattern)?)
    }

    fn select_folder(&mut self, folder: &str, readonly: bool) -> backend::Result<u32> {
        let encoded = encode_utf7(folder.to_owned());
        debug!("utf7 encoded folder: {:?}", encoded);

        let mbox = if readonly {
            self.session.examine(&encoded)
        } else {
            self.session.select(&encoded)
        }
        .map_err(|err| Error::SelectFolderError(err, folder.to_owned()))?;

        self.selected = Some(folder.to_owned());
        Ok(mbox.exists)
    }

    fn search(&mut self, query: &SearchQuery) -> backend::Result<Vec<u32>> {
        let query = query.to_imap_query();
        debug!("search query: {}", query);

        let mut seqs: Vec<u32> = self
            .session
            .search(&query)
            .map_err(|err| Error::SearchMsgsError(err, query.clone()))?
            .into_iter()
            .collect();
        seqs.sort_unstable();

        trace!("seqs: {:?}", seqs);
        Ok(seqs)
    }

    fn fetch_headers(&mut self, seqs: &[u32]) -> backend::Result<Vec<(u32, Vec<u8>)>> {
        Ok(self.fetch(seqs)?)
    }

    fn copy_emails(&mut self, seqs: &[u32], folder: &str) -> backend::Result<()> {
        let range = to_sequence_set(seqs);
        let encoded = encode_utf7(folder.to_owned());
        debug!("copy {} to {:?}", range, encoded);

        self.session
            .copy(&range, &encoded)
            .map_err(|err| Error::CopyEmailError(err, range, folder.to_owned()))?;

        Ok(())
    }

    fn add_flags(&mut self, seqs: &[u32], flags: &Flags) -> backend::Result<()> {
        let range = to_sequence_set(seqs);
        let query = flags.to_imap_query();
        debug!("add flags ({}) to {}", query, range);

        self.session
            .store(&range, format!("+FLAGS ({})", query))
            .map_err(|err| Error::AddFlagsError(err, query, range))?;

        Ok(())
    }

    fn close_folder(&mut self) -> backend::Result<()> {
        if let Some(folder) = self.selected.take() {
            debug!("close folder {}", folder);
            self.session
                .close()
                .map_err(|err| Error::CloseFolderError(err, folder))?;
        }

        Ok(())
    }

    fn logout(&mut self) -> backend::Result<()> {
        self.session.logout().map_err(Error::LogoutError)?;
        Ok(())
    }
}

/// Quotes a LIST pattern, escaping quotes and backslashes.
fn quote(pattern: &str) -> String {
    format!("\"{}\"", pattern.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Renders a folder attribute the way it appears on the wire.
fn attribute_name(attr: &NameAttribute) -> String {
    match attr {
        NameAttribute::NoInferiors => "\\Noinferiors".into(),
        NameAttribute::NoSelect => "\\Noselect".into(),
        NameAttribute::Marked => "\\Marked".into(),
        NameAttribute::Unmarked => "\\Unmarked".into(),
        NameAttribute::Extension(ext) => ext.to_string(),
        attr => format!("\\{:?}", attr),
    }
}

#[cfg(test)]
mod tests {
    use super::quote;

    #[test]
    fn quote_pattern() {
        assert_eq!("\"\"", quote(""));
        assert_eq!("\"*\"", quote("*"));
        assert_eq!("\"/*\"", quote("/*"));
        assert_eq!("\"\\\\*\"", quote("\\*"));
    }
}
