// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sharespool — Core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod credentials;
pub mod error;
pub mod human_errors;
pub mod types;

pub use config::SpoolConfig;
pub use credentials::{CredentialProvider, StaticCredentials};
pub use error::{ErrorKind, SpoolError};
pub use human_errors::{HumanError, Severity, humanize_error, humanize_failure};
pub use types::*;
