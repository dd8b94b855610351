// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line definition.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Discover printer shares on an SMB3 print server and print to them.
#[derive(Debug, Parser)]
#[command(name = "sharespool", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Directory holding config.json, the credential store, and the audit log
    #[arg(long, global = true, env = "SHARESPOOL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store your print server account (password is prompted)
    Login {
        #[arg(short, long)]
        username: String,
    },

    /// Forget the stored account
    Logout,

    /// List the printers published by the server
    Printers,

    /// Send a document to a printer
    Print {
        /// Printer share name, as shown by `sharespool printers`
        #[arg(short, long)]
        printer: String,

        /// Document to print (already in a format the printer understands)
        file: PathBuf,
    },

    /// Show recent discovery and print activity
    History {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },

    /// Print the effective configuration as JSON
    Config,
}
