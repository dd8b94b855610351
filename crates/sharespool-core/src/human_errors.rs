// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how the command-line host presents the failure.

use crate::error::{ErrorKind, SpoolError};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip, server busy — trying again later may work.
    Transient,
    /// User must do something (log in, pick another printer, fix a path).
    ActionRequired,
    /// Cannot be fixed by retrying or user action.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Severity level.
    pub severity: Severity,
}

/// Convert a `SpoolError` into a `HumanError`.
pub fn humanize_error(err: &SpoolError) -> HumanError {
    match err {
        SpoolError::CredentialsMissing => HumanError {
            message: "You're not logged in.".into(),
            suggestion: "Run `sharespool login` and enter your account name and password.".into(),
            severity: Severity::ActionRequired,
        },

        SpoolError::PrinterUnresolved => HumanError {
            message: "That printer isn't available.".into(),
            suggestion: "Run `sharespool printers` to see the printers you can use.".into(),
            severity: Severity::ActionRequired,
        },

        SpoolError::DocumentUnavailable(detail) => HumanError {
            message: "The document couldn't be read.".into(),
            suggestion: format!("Check the file exists and you can open it. ({detail})"),
            severity: Severity::ActionRequired,
        },

        SpoolError::Transport(detail) => humanize_transport(detail),

        SpoolError::Auth(_) => HumanError {
            message: "The print server didn't accept your login.".into(),
            suggestion: "Check your account name and password, then run `sharespool login` again.".into(),
            severity: Severity::ActionRequired,
        },

        SpoolError::Rpc(_) => HumanError {
            message: "The print server wouldn't list its printers.".into(),
            suggestion: "Try again in a moment. If this keeps happening, the server may be under maintenance.".into(),
            severity: Severity::Transient,
        },

        SpoolError::PrintTransport(detail) => HumanError {
            message: "The document didn't reach the printer.".into(),
            suggestion: format!("Try printing again. ({detail})"),
            severity: Severity::Transient,
        },

        SpoolError::NotAPrinter(name) => HumanError {
            message: format!("'{name}' isn't a printer."),
            suggestion: "Pick a printer from `sharespool printers` instead.".into(),
            severity: Severity::ActionRequired,
        },

        SpoolError::Config(detail) => HumanError {
            message: "The configuration file has a problem.".into(),
            suggestion: format!("Fix the setting and try again. ({detail})"),
            severity: Severity::ActionRequired,
        },

        SpoolError::Encryption(_) | SpoolError::Decryption(_) => HumanError {
            message: "Your saved login couldn't be read or written.".into(),
            suggestion: "Run `sharespool logout`, then `sharespool login` to store it again.".into(),
            severity: Severity::ActionRequired,
        },

        SpoolError::Database(_) => HumanError {
            message: "The print history had a problem.".into(),
            suggestion: "Printing still works. If this keeps happening, delete the history database.".into(),
            severity: Severity::Transient,
        },

        SpoolError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Check the path and try again.".into(),
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Permission denied.".into(),
                    suggestion: "Check the file permissions and try again.".into(),
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your disk may be full.".into(),
                    severity: Severity::Transient,
                }
            }
        }

        SpoolError::Unexpected(_) | SpoolError::Serialization(_) => HumanError {
            message: "Something unexpected went wrong.".into(),
            suggestion: "Try again. If this keeps happening, please report it with the log output (RUST_LOG=debug).".into(),
            severity: Severity::Permanent,
        },
    }
}

/// Convert a failure that only survived as its kind and reason string (as
/// carried by a finished job's report).
pub fn humanize_failure(kind: ErrorKind, reason: &str) -> HumanError {
    let err = match kind {
        ErrorKind::CredentialsMissing => SpoolError::CredentialsMissing,
        ErrorKind::PrinterUnresolved => SpoolError::PrinterUnresolved,
        ErrorKind::DocumentUnavailable => SpoolError::DocumentUnavailable(reason.into()),
        ErrorKind::Transport => SpoolError::Transport(reason.into()),
        ErrorKind::Auth => SpoolError::Auth(reason.into()),
        ErrorKind::Rpc => SpoolError::Rpc(reason.into()),
        ErrorKind::PrintTransport => match refused_share(reason) {
            Some(name) => SpoolError::NotAPrinter(name.into()),
            None => SpoolError::PrintTransport(reason.into()),
        },
        ErrorKind::Unexpected => SpoolError::Unexpected(reason.into()),
    };
    humanize_error(&err)
}

/// Share name from a `NotAPrinter` reason, which reports under the
/// print-transport kind.
fn refused_share(reason: &str) -> Option<&str> {
    reason
        .strip_prefix("share '")?
        .strip_suffix("' cannot be opened as a printer")
}

/// Transport failures arrive as free-form detail from the backend; pick the
/// most useful hint from it.
fn humanize_transport(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("timed out") || lower.contains("unreachable") {
        HumanError {
            message: "The print server can't be reached.".into(),
            suggestion: "Check you're on the right network (or VPN), then try again.".into(),
            severity: Severity::Transient,
        }
    } else if lower.contains("negotiat") || lower.contains("protocol") {
        HumanError {
            message: "We couldn't agree on a secure connection with the print server.".into(),
            suggestion: "The server must support encrypted SMB 3. Check the host name in your configuration.".into(),
            severity: Severity::Permanent,
        }
    } else {
        HumanError {
            message: "The connection to the print server failed.".into(),
            suggestion: format!("Try again in a moment. (Detail: {detail})"),
            severity: Severity::Transient,
        }
    }
}
