// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Sharespool.

use thiserror::Error;

/// Top-level error type for all Sharespool operations.
///
/// The `Display` text of each variant is the reason string reported to the
/// host when a job fails, so it names the failing step and carries the
/// underlying detail.
#[derive(Debug, Error)]
pub enum SpoolError {
    // -- Job preconditions --
    #[error("no credentials configured")]
    CredentialsMissing,

    #[error("printer information unavailable")]
    PrinterUnresolved,

    #[error("failed to access print document: {0}")]
    DocumentUnavailable(String),

    // -- Transport --
    #[error("could not connect to print server: {0}")]
    Transport(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("share enumeration failed: {0}")]
    Rpc(String),

    #[error("print transfer failed: {0}")]
    PrintTransport(String),

    #[error("share '{0}' cannot be opened as a printer")]
    NotAPrinter(String),

    #[error("unexpected error while printing: {0}")]
    Unexpected(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure taxonomy, used to match errors without comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CredentialsMissing,
    PrinterUnresolved,
    DocumentUnavailable,
    Transport,
    Auth,
    Rpc,
    PrintTransport,
    Unexpected,
}

impl SpoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialsMissing => ErrorKind::CredentialsMissing,
            Self::PrinterUnresolved => ErrorKind::PrinterUnresolved,
            Self::DocumentUnavailable(_) => ErrorKind::DocumentUnavailable,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Rpc(_) => ErrorKind::Rpc,
            // Opening the share is the first half of the print transfer.
            Self::PrintTransport(_) | Self::NotAPrinter(_) => ErrorKind::PrintTransport,
            Self::Unexpected(_)
            | Self::Config(_)
            | Self::Encryption(_)
            | Self::Decryption(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::Unexpected,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SpoolError>;
