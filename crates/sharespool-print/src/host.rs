// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host print framework boundary.
//
// The host drives the controllers through `DiscoveryHandler` and
// `JobHandler`, one method per transition. Everything the controllers report
// back travels as a `HostEvent` over a single-consumer channel; the receiving
// task is the host's callback context.

use tokio::sync::mpsc;
use tracing::warn;

use sharespool_core::error::ErrorKind;
use sharespool_core::types::{JobId, PrinterDescriptor, PrinterId};

use crate::jobs::QueuedJob;
use crate::submitter::SubmitReport;

/// A report from a controller to the host.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Result of one discovery pass, always a complete batch. Empty when the
    /// pass failed.
    PrintersAdded(Vec<PrinterDescriptor>),
    JobStarted(JobId),
    JobSucceeded { job: JobId, report: SubmitReport },
    JobFailed {
        job: JobId,
        kind: ErrorKind,
        reason: String,
    },
    JobCancelled(JobId),
}

impl HostEvent {
    /// The job this event belongs to, if any.
    pub fn job(&self) -> Option<JobId> {
        match self {
            Self::PrintersAdded(_) => None,
            Self::JobStarted(job) | Self::JobCancelled(job) => Some(*job),
            Self::JobSucceeded { job, .. } | Self::JobFailed { job, .. } => Some(*job),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::JobSucceeded { .. } | Self::JobFailed { .. } | Self::JobCancelled(_)
        )
    }
}

/// Sending half of the callback channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HostDispatcher {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl HostDispatcher {
    /// Create a dispatcher and the receiver the host drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Hand an event to the host. A host that has gone away is logged, not
    /// an error: there is nobody left to report to.
    pub fn dispatch(&self, event: HostEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(event = ?e.0, "host callback context closed, report dropped");
        }
    }
}

/// Discovery-session callbacks invoked by the host.
pub trait DiscoveryHandler {
    /// Begin a discovery pass. Hints are accepted and ignored: every pass
    /// enumerates the whole server.
    fn on_discovery_start(&self, priority_hints: &[PrinterId]);

    fn on_discovery_stop(&self);

    /// The subset of `ids` this session has published, in request order.
    fn on_validate(&self, ids: &[PrinterId]) -> Vec<PrinterId>;

    fn on_start_tracking(&self, id: &PrinterId);

    fn on_stop_tracking(&self, id: &PrinterId);

    /// Tear the session down. Idempotent.
    fn on_destroy(&self);
}

/// Print-job callbacks invoked by the host.
pub trait JobHandler {
    fn on_job_queued(&self, job: QueuedJob);

    fn on_cancel_requested(&self, job: &JobId);
}
