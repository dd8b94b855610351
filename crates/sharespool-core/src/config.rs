// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpoolError};
use crate::types::{Endpoint, PrinterCapabilities, share_type};

/// Persistent settings. Every field is consumed as-is by the controllers;
/// nothing here is computed at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    /// The file-and-print server and authentication realm.
    pub endpoint: Endpoint,
    /// Which enumerated shares count as printers.
    pub filter: FilterConfig,
    /// Capability set advertised for every printer.
    pub capabilities: PrinterCapabilities,
    /// Session security requirements.
    pub security: SecurityConfig,
    /// Settings for the `smbclient` transport backend.
    pub smbclient: SmbClientConfig,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::new("nts27.comp.nus.edu.sg", "nusstu"),
            filter: FilterConfig::default(),
            capabilities: PrinterCapabilities::default(),
            security: SecurityConfig::default(),
            smbclient: SmbClientConfig::default(),
        }
    }
}

/// Printer filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Shares never offered as printers even when typed as print queues.
    pub excluded_share_names: BTreeSet<String>,
    /// Type discriminator marking a share as a print queue.
    pub printer_type_code: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            // Driver-distribution queue, not a physical printer.
            excluded_share_names: BTreeSet::from(["Lexmark Universal v2".to_owned()]),
            printer_type_code: share_type::PRINT_QUEUE,
        }
    }
}

/// SMB protocol dialects, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "SMB2_02")]
    Smb202,
    #[serde(rename = "SMB2_10")]
    Smb210,
    #[serde(rename = "SMB3_00")]
    Smb300,
    #[serde(rename = "SMB3_02")]
    Smb302,
    #[serde(rename = "SMB3_11")]
    Smb311,
}

impl Dialect {
    /// Dialects without transport encryption.
    pub fn is_legacy(&self) -> bool {
        *self < Dialect::Smb300
    }

    /// Protocol name as understood by Samba tooling.
    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Smb202 => "SMB2_02",
            Self::Smb210 => "SMB2_10",
            Self::Smb300 => "SMB3_00",
            Self::Smb302 => "SMB3_02",
            Self::Smb311 => "SMB3_11",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.protocol_name())
    }
}

/// Session security requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Dialects the client offers. Only SMB 3.x is accepted.
    pub dialects: Vec<Dialect>,
    /// Require payload encryption on the wire.
    pub require_encryption: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            dialects: vec![Dialect::Smb300, Dialect::Smb302, Dialect::Smb311],
            require_encryption: true,
        }
    }
}

/// `smbclient` backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmbClientConfig {
    /// Program name or path.
    pub program: String,
    /// Timeout for the initial TCP connect.
    pub connect_timeout_secs: u64,
}

impl Default for SmbClientConfig {
    fn default() -> Self {
        Self {
            program: "smbclient".into(),
            connect_timeout_secs: 10,
        }
    }
}

impl SpoolConfig {
    /// Reject settings the transport must never run with.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.host.trim().is_empty() {
            return Err(SpoolError::Config("endpoint.host is empty".into()));
        }
        if self.endpoint.port == 0 {
            return Err(SpoolError::Config("endpoint.port must be non-zero".into()));
        }
        if self.security.dialects.is_empty() {
            return Err(SpoolError::Config("security.dialects is empty".into()));
        }
        if let Some(legacy) = self.security.dialects.iter().find(|d| d.is_legacy()) {
            return Err(SpoolError::Config(format!(
                "legacy dialect {legacy} is not allowed; only SMB 3.x with encryption"
            )));
        }
        if !self.security.require_encryption {
            return Err(SpoolError::Config(
                "security.require_encryption cannot be disabled".into(),
            ));
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults when the file
    /// does not exist. The result is validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok(config)
    }
}
