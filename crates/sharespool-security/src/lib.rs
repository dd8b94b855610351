// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sharespool security — encrypted credential storage, document
// fingerprinting, and the append-only audit trail.

pub mod audit;
pub mod credentials;
pub mod integrity;

pub use audit::{AuditEntry, AuditLog};
pub use credentials::EncryptedCredentialStore;
pub use integrity::{Fingerprint, StreamDigest, hash_bytes};
