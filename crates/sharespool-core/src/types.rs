// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Sharespool print client.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default SMB port (direct TCP, no NetBIOS).
pub const SMB_PORT: u16 = 445;

/// Username/password pair handed to the server during session setup.
///
/// The password never appears in `Debug` output so that a stray `?creds` in a
/// log line cannot leak it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The file-and-print server and the realm its accounts live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub domain: String,
    #[serde(default = "default_smb_port")]
    pub port: u16,
}

fn default_smb_port() -> u16 {
    SMB_PORT
}

impl Endpoint {
    pub fn new(host: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            domain: domain.into(),
            port: SMB_PORT,
        }
    }
}

/// Share type discriminators as reported by the server service (srvsvc
/// `STYPE_*` values with the special/temporary bits masked off).
pub mod share_type {
    pub const DISK: u32 = 0;
    pub const PRINT_QUEUE: u32 = 1;
    pub const DEVICE: u32 = 2;
    pub const IPC: u32 = 3;
}

/// One entry of a server share enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareDescriptor {
    pub name: String,
    pub type_code: u32,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ShareDescriptor {
    pub fn new(name: impl Into<String>, type_code: u32) -> Self {
        Self {
            name: name.into(),
            type_code,
            comment: None,
        }
    }
}

/// Stable identity of a printer within a discovery session.
///
/// Derived deterministically from the issuing service (the server host) and
/// the share name, which doubles as the local id used to open the share when
/// a job targets this printer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrinterId {
    service: String,
    local_id: String,
}

impl PrinterId {
    pub fn new(service: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            local_id: local_id.into(),
        }
    }

    /// The service that issued this id.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The share name this printer was built from.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }
}

impl std::fmt::Display for PrinterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service, self.local_id)
    }
}

/// Printer status reported to the host. Live status is never polled, so every
/// published printer is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterStatus {
    Idle,
}

/// Media size. The capability set advertises exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSize {
    IsoA4,
}

impl MediaSize {
    /// PWG self-describing media name.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::IsoA4 => "iso_a4_210x297mm",
        }
    }
}

/// Print resolution in dots per inch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub id: String,
    pub label: String,
    pub horizontal_dpi: u32,
    pub vertical_dpi: u32,
}

impl Resolution {
    pub fn square(dpi: u32) -> Self {
        Self {
            id: format!("{dpi}dpi"),
            label: format!("{dpi}dpi"),
            horizontal_dpi: dpi,
            vertical_dpi: dpi,
        }
    }
}

/// Colour mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    Monochrome,
    Color,
}

/// Minimum margins in mils (thousandths of an inch).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Margins {
    pub const ZERO: Margins = Margins {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };
}

/// The fixed capability set advertised for every published printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterCapabilities {
    pub media_size: MediaSize,
    pub resolution: Resolution,
    pub color_mode: ColorMode,
    pub margins: Margins,
}

impl Default for PrinterCapabilities {
    fn default() -> Self {
        Self {
            media_size: MediaSize::IsoA4,
            resolution: Resolution::square(600),
            color_mode: ColorMode::Color,
            margins: Margins::ZERO,
        }
    }
}

/// A printer as published to the host. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterDescriptor {
    id: PrinterId,
    display_name: String,
    status: PrinterStatus,
    capabilities: PrinterCapabilities,
}

impl PrinterDescriptor {
    pub fn new(
        id: PrinterId,
        display_name: impl Into<String>,
        capabilities: PrinterCapabilities,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            status: PrinterStatus::Idle,
            capabilities,
        }
    }

    pub fn id(&self) -> &PrinterId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn status(&self) -> PrinterStatus {
        self.status
    }

    pub fn capabilities(&self) -> &PrinterCapabilities {
        &self.capabilities
    }
}

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Handed to the controller, nothing reported yet.
    Queued,
    /// Reported as started to the host.
    Started,
    /// Document fully delivered to the printer share.
    Succeeded,
    /// Gave up, see the reported reason.
    Failed,
    /// Cancelled on request.
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Terminal states accept nothing; a queued job may only start or be
    /// cancelled.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Started | Self::Cancelled),
            Self::Started => next.is_terminal(),
            Self::Succeeded | Self::Failed | Self::Cancelled => false,
        }
    }
}

/// Lifecycle states of a discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryState {
    Idle,
    Discovering,
    Published,
    Failed,
    /// Torn down. Terminal.
    Stopped,
}

impl DiscoveryState {
    pub fn can_transition_to(&self, next: DiscoveryState) -> bool {
        use DiscoveryState::*;
        match (self, next) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            (Idle | Published | Failed, Discovering) => true,
            (Discovering, Published | Failed) => true,
            _ => false,
        }
    }
}
