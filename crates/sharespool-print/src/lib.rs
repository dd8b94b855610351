// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sharespool Print — SMB3 printer-share discovery, print submission, and the
// job lifecycle.  The controllers are generic over the transport seam in
// `transport`; `smbclient` is the production backend.

pub mod discovery;
pub mod document;
pub mod host;
pub mod jobs;
pub mod shares;
pub mod smbclient;
pub mod submitter;
pub mod transport;

#[cfg(test)]
mod testing;

pub use discovery::DiscoverySession;
pub use document::{BytesDocument, DocumentSource, FileDocument};
pub use host::{DiscoveryHandler, HostDispatcher, HostEvent, JobHandler};
pub use jobs::{PrintJobController, QueuedJob};
pub use shares::{filter_printers, list_shares};
pub use smbclient::SmbClientTransport;
pub use submitter::{SubmitReport, submit};
