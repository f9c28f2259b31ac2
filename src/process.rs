//! Process module.
//!
//! This module contains cross platform helpers around the
//! `std::process` crate: running password commands and spawning the
//! IMAP process transport.

use log::debug;
use std::{
    env,
    io::{self, prelude::*},
    process::{Child, Command, Stdio},
    result, string,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse command output")]
    ParseCmdOutputError(#[source] string::FromUtf8Error),
    #[error("cannot spawn process for command {1:?}")]
    SpawnProcessError(#[source] io::Error, String),
    #[error("cannot get standard input")]
    GetStdinError,
    #[error("cannot write data to standard input")]
    WriteStdinError(#[source] io::Error),
    #[error("cannot get standard output")]
    GetStdoutError,
    #[error("cannot read data from standard output")]
    ReadStdoutError(#[source] io::Error),
    #[error("cannot wait for command {1:?}")]
    WaitProcessError(#[source] io::Error, String),
}

pub type Result<T> = result::Result<T, Error>;

/// Runs the given command and returns the output as UTF8 string.
pub fn run(cmd: &str) -> Result<String> {
    let mut output = Vec::new();

    for cmd in cmd.split('|') {
        debug!("running command: {}", cmd);
        output = pipe(cmd.trim(), &output)?;
    }

    String::from_utf8(output).map_err(Error::ParseCmdOutputError)
}

/// Runs the given command in a pipeline and returns the raw output.
pub fn pipe(cmd: &str, input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut child = spawn(cmd, Stdio::piped())?;

    {
        let mut stdin = child.stdin.take().ok_or(Error::GetStdinError)?;
        stdin.write_all(input).map_err(Error::WriteStdinError)?;
    }

    child
        .stdout
        .take()
        .ok_or(Error::GetStdoutError)?
        .read_to_end(&mut output)
        .map_err(Error::ReadStdoutError)?;

    child
        .wait()
        .map_err(|err| Error::WaitProcessError(err, cmd.to_owned()))?;

    Ok(output)
}

/// Spawns the given command through the system shell with piped
/// standard input and output. The standard error is either piped or
/// inherited, depending on the caller.
pub fn spawn(cmd: &str, stderr: Stdio) -> Result<Child> {
    let windows = cfg!(target_os = "windows")
        && env::var("MSYSTEM")
            .map(|env| !env.starts_with("MINGW"))
            .unwrap_or_default();

    let mut command = if windows {
        let mut command = Command::new("cmd");
        command.args(["/C", cmd]);
        command
    } else {
        let mut command = Command::new("sh");
        command.arg("-c").arg(cmd);
        command
    };

    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(stderr)
        .spawn()
        .map_err(|err| Error::SpawnProcessError(err, cmd.to_owned()))
}
