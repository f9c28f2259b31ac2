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

use clap::Parser;
use env_logger::Env;
use log::info;
use std::{error::Error, process::ExitCode};

use imap_dedup::{
    config::expand_path,
    reconcile::{self, Artifacts, ReconcileConfig, StageOutcome},
    ImapBackend,
};

/// Reconcile a target account holding imported copies of a source
/// account: each call runs the next of the four stages.
#[derive(Debug, Parser)]
#[command(name = "imapdedup-reconcile", version)]
struct Cli {
    /// JSON config file, the work directory is created next to it
    config: String,
    /// Print the target identities never seen at source
    #[arg(long)]
    print_unmatched: bool,
    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(err.as_ref());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let path = expand_path(&cli.config)?;
    let config = ReconcileConfig::from_path(&path)?;
    let artifacts = Artifacts::from_config_path(&path)?;

    let (stage, outcome) = reconcile::run_next_stage(&config, &artifacts, |side, imap_config| {
        info!("Connecting to the {:?} account", side);
        Ok(ImapBackend::new(imap_config)?)
    })?;
    info!("Done with {}", stage);

    if let StageOutcome::Purged { unmatched, .. } = outcome {
        if cli.print_unmatched {
            for id in unmatched {
                println!("{}", id);
            }
        }
    }

    Ok(())
}

fn print_error(err: &dyn Error) {
    eprintln!("Error: {}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}
