//! CLI module.
//!
//! This module contains the command line of the single-account run
//! and its conversion into the backend and run configs.

use clap::Parser;
use std::path::PathBuf;

use crate::{
    config::{self, expand_path, parse_sent_before, Error, Result},
    DedupConfig, IdentityMode, ImapConfig, Mark,
};

#[derive(Debug, Parser)]
#[command(
    name = "imapdedup",
    version,
    about = "Mark duplicate messages in IMAP mailboxes for deletion"
)]
pub struct Cli {
    /// IMAP process to access mailboxes, instead of a server
    #[arg(short = 'P', long)]
    pub process: Option<String>,
    /// IMAP server
    #[arg(short, long)]
    pub server: Option<String>,
    /// IMAP server port
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Use SSL
    #[arg(short = 'x', long)]
    pub ssl: bool,
    /// Require STARTTLS
    #[arg(short = 'X', long)]
    pub starttls: bool,
    /// Trust any certificate
    #[arg(short = 'k', long)]
    pub insecure: bool,
    /// IMAP user name
    #[arg(short, long)]
    pub user: Option<String>,
    /// IMAP admin user, authenticating on behalf of the user
    #[arg(short = 'a', long)]
    pub authuser: Option<String>,
    /// IMAP password, read from IMAPDEDUP_PASSWORD when not given
    #[arg(short = 'w', long)]
    pub password: Option<String>,
    /// Command printing the IMAP password
    #[arg(long)]
    pub password_cmd: Option<String>,
    /// Verbose mode
    #[arg(short, long)]
    pub verbose: bool,
    /// Show duplicated messages
    #[arg(short = 'S', long)]
    pub show: bool,
    /// Don't actually do anything, just report what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,
    /// Use a checksum of several mail headers, instead of the Message-ID
    #[arg(short, long)]
    pub checksum: bool,
    /// Include the Message-ID (if any) in the checksum
    #[arg(short = 'm', long)]
    pub checksum_with_id: bool,
    /// Save list of messages, subjects, senders, etc to a file
    #[arg(long)]
    pub save_msg_list: Option<String>,
    /// Save IDs of all messages found to a file
    #[arg(short = 'i', long)]
    pub save_ids: Option<String>,
    /// Read a list of IDs and mark all of them for deletion if found
    #[arg(long)]
    pub delete_ids: Option<String>,
    /// Only process messages sent before the given date, e.g. 1-Feb-2020
    #[arg(short = 'b', long = "sentbefore")]
    pub sent_before: Option<String>,
    /// Do not close the mailbox when done, some servers purge deleted
    /// messages on close
    #[arg(long)]
    pub no_close: bool,
    /// Just list mailboxes
    #[arg(short, long)]
    pub list: bool,
    /// Save list of mailboxes to a JSON file
    #[arg(long)]
    pub save_list: Option<String>,
    /// Remove duplicates recursively
    #[arg(short, long)]
    pub recursive: bool,
    /// Walk through the folders in reverse order
    #[arg(short = 'R', long)]
    pub reverse: bool,
    /// Tag duplicates with the given tag instead of deleting them
    #[arg(short = 't', long = "only-tag")]
    pub tag: Option<String>,
    /// Copy messages to the given mailbox before deleting them
    #[arg(short = 'y', long)]
    pub copy: Option<String>,
    /// Number of messages fetched per request
    #[arg(long, default_value_t = config::DEFAULT_FETCH_BATCH_SIZE)]
    pub fetch_batch_size: usize,
    /// Number of messages marked per request
    #[arg(long, default_value_t = config::DEFAULT_ACTION_BATCH_SIZE)]
    pub action_batch_size: usize,
    pub mailboxes: Vec<String>,
}

impl Cli {
    /// Validates the options and builds the configs. Nothing here
    /// touches the network.
    pub fn into_configs(self) -> Result<(ImapConfig, DedupConfig)> {
        let has_server = self.server.is_some() && self.user.is_some();
        if !has_server && self.process.is_none() {
            return Err(Error::MissingServerError);
        }

        let identity_mode = match (self.checksum, self.checksum_with_id) {
            (false, true) => return Err(Error::ChecksumWithIdWithoutChecksumError),
            (false, false) => IdentityMode::MessageId,
            (true, include_message_id) => IdentityMode::Checksum { include_message_id },
        };

        let dedup_config = DedupConfig {
            mailboxes: self.mailboxes,
            identity_mode,
            dry_run: self.dry_run,
            verbose: self.verbose,
            show: self.show,
            recursive: self.recursive,
            reverse: self.reverse,
            sent_before: self.sent_before.as_deref().map(parse_sent_before).transpose()?,
            mark: self.tag.map(Mark::Tag).unwrap_or_default(),
            copy_to: self.copy,
            list_only: self.list,
            save_list: expand(self.save_list)?,
            save_ids: expand(self.save_ids)?,
            save_export: expand(self.save_msg_list)?,
            forced_ids: expand(self.delete_ids)?,
            no_close: self.no_close,
            fetch_batch_size: self.fetch_batch_size,
            action_batch_size: self.action_batch_size,
        };
        dedup_config.validate()?;

        let imap_config = ImapConfig {
            host: self.server.unwrap_or_default(),
            port: self.port,
            ssl: Some(self.ssl),
            starttls: Some(self.starttls),
            insecure: Some(self.insecure),
            process_cmd: self.process,
            login: self.user.unwrap_or_default(),
            auth_user: self.authuser,
            passwd: self.password,
            passwd_cmd: self.password_cmd,
        };

        Ok((imap_config, dedup_config))
    }
}

fn expand(path: Option<String>) -> Result<Option<PathBuf>> {
    path.as_deref().map(expand_path).transpose()
}
