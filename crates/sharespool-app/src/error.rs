// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CLI error type and exit codes.

use thiserror::Error;

use sharespool_core::{
    ErrorKind, HumanError, Severity, SpoolError, humanize_error, humanize_failure,
};

pub mod exit_code {
    pub const GENERAL: u8 = 1;
    pub const JOB_FAILED: u8 = 2;
    /// Conventional 128 + SIGINT.
    pub const CANCELLED: u8 = 130;
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Spool(#[from] SpoolError),

    #[error("print job failed: {reason}")]
    JobFailed { kind: ErrorKind, reason: String },

    #[error("printer discovery failed: {reason}")]
    DiscoveryFailed { kind: ErrorKind, reason: String },

    #[error("print job cancelled")]
    Cancelled,
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Spool(_) | Self::DiscoveryFailed { .. } => exit_code::GENERAL,
            Self::JobFailed { .. } => exit_code::JOB_FAILED,
            Self::Cancelled => exit_code::CANCELLED,
        }
    }

    /// Plain-English rendering for the terminal.
    pub fn human(&self) -> Option<HumanError> {
        match self {
            Self::Spool(e) => Some(humanize_error(e)),
            Self::JobFailed { kind, reason } | Self::DiscoveryFailed { kind, reason } => {
                Some(humanize_failure(*kind, reason))
            }
            Self::Cancelled => None,
        }
    }

    /// What goes to stderr. Severity decides whether a retry is worth it.
    pub fn report(&self) -> String {
        let Some(human) = self.human() else {
            return self.to_string();
        };
        let hint = match human.severity {
            Severity::Transient => "\n  This is usually temporary; running the command again may work.",
            Severity::ActionRequired => "",
            Severity::Permanent => "\n  Retrying won't help until the configuration or server changes.",
        };
        format!("{}\n  {}{hint}", human.message, human.suggestion)
    }
}
