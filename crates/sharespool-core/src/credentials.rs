// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Credential provider seam.
//
// The controllers fetch credentials fresh for every discovery pass and every
// print job and never cache them; whoever implements this trait owns storage.

use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::types::Credentials;

/// Source of the username/password pair used to log in to the print server.
///
/// Implementations are called from background tasks (via `spawn_blocking`),
/// possibly from several jobs at once, and must tolerate that.
pub trait CredentialProvider: Send + Sync {
    /// Return the stored credentials, or `None` when nothing has been stored
    /// or the stored record can't be read back. Never fails.
    fn get_credentials(&self) -> Option<Credentials>;

    /// Replace the stored credentials.
    fn save_credentials(&self, username: &str, password: &str) -> Result<()>;

    /// Forget the stored credentials. Clearing an empty store is not an error.
    fn clear_credentials(&self) -> Result<()>;
}

/// In-memory provider for embedding hosts that manage secrets themselves.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    inner: Mutex<Option<Credentials>>,
}

impl StaticCredentials {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            inner: Mutex::new(credentials),
        }
    }

    pub fn empty() -> Self {
        Self::new(None)
    }
}

impl CredentialProvider for StaticCredentials {
    fn get_credentials(&self) -> Option<Credentials> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save_credentials(&self, username: &str, password: &str) -> Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Credentials::new(username, password));
        Ok(())
    }

    fn clear_credentials(&self) -> Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}
