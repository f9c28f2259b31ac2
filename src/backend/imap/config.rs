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

//! IMAP backend config module.
//!
//! This module contains the representation of the IMAP backend
//! configuration of an account.

use serde::Deserialize;
use std::{env, result};
use thiserror::Error;

use crate::process;

/// Environment variable read when no password nor password command is
/// configured.
pub const PASSWD_ENV_VAR: &str = "IMAPDEDUP_PASSWORD";

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot get imap password")]
    GetPasswdError(#[source] process::Error),
    #[error("cannot get imap password: password is empty")]
    GetPasswdEmptyError,
    #[error("cannot get imap password: no password, password command nor {0} variable")]
    GetPasswdMissingError(&'static str),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the transport security of the connection.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Security {
    /// Implicit TLS, from the first byte.
    Tls,
    /// Plain connection upgraded with STARTTLS, failing when the
    /// server does not offer it.
    StartTls,
    /// Plain connection upgraded with STARTTLS when the server offers
    /// it, left unencrypted otherwise.
    Opportunistic,
}

/// Represents the IMAP backend configuration.
#[derive(Debug, Default, Clone, Eq, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImapConfig {
    /// Represents the IMAP server host.
    pub host: String,
    /// Represents the IMAP server port. Defaults to 993 with SSL,
    /// 143 otherwise.
    pub port: Option<u16>,
    /// Enables SSL (implicit TLS).
    pub ssl: Option<bool>,
    /// Requires StartTLS. It is used anyway when offered.
    pub starttls: Option<bool>,
    /// Trusts any certificate.
    pub insecure: Option<bool>,
    /// Represents the command whose standard input and output are
    /// used as the IMAP connection, instead of the network.
    pub process_cmd: Option<String>,
    /// Represents the IMAP server login.
    pub login: String,
    /// Represents the admin user authenticating on behalf of `login`.
    pub auth_user: Option<String>,
    /// Represents the IMAP server password.
    pub passwd: Option<String>,
    /// Represents the IMAP server password command.
    pub passwd_cmd: Option<String>,
}

impl ImapConfig {
    /// Retrieves the IMAP server password: the configured password
    /// first, then the output of the password command, then the
    /// environment.
    pub fn passwd(&self) -> Result<String> {
        if let Some(passwd) = self.passwd.as_ref() {
            return Ok(passwd.to_owned());
        }

        if let Some(cmd) = self.passwd_cmd.as_ref() {
            let passwd = process::run(cmd).map_err(Error::GetPasswdError)?;
            let passwd = passwd
                .lines()
                .next()
                .filter(|passwd| !passwd.is_empty())
                .ok_or(Error::GetPasswdEmptyError)?;
            return Ok(passwd.to_owned());
        }

        env::var(PASSWD_ENV_VAR).map_err(|_| Error::GetPasswdMissingError(PASSWD_ENV_VAR))
    }

    /// Gets the SSL IMAP option.
    pub fn ssl(&self) -> bool {
        self.ssl.unwrap_or_default()
    }

    /// Gets the StartTLS IMAP option.
    pub fn starttls(&self) -> bool {
        self.starttls.unwrap_or_default()
    }

    /// Gets the insecure IMAP option.
    pub fn insecure(&self) -> bool {
        self.insecure.unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(if self.ssl() { 993 } else { 143 })
    }

    pub fn security(&self) -> Security {
        if self.ssl() {
            Security::Tls
        } else if self.starttls() {
            Security::StartTls
        } else {
            Security::Opportunistic
        }
    }
}
