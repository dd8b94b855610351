// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print job controller.
//
// Each queued job is reported STARTED immediately, then runs on its own
// task: credentials, printer name, document stream, session, submit. The
// outcome becomes exactly one terminal report. Cancellation races the task
// through a compare-and-set on the job's state; whichever side reaches a
// terminal state first reports, the other is logged and dropped. A cancelled
// task is aborted, which drops the transfer and everything it holds.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use sharespool_core::credentials::CredentialProvider;
use sharespool_core::error::{Result, SpoolError};
use sharespool_core::types::{Endpoint, JobId, JobState, PrinterId};

use crate::document::DocumentSource;
use crate::host::{HostDispatcher, HostEvent, JobHandler};
use crate::submitter::{SubmitReport, submit};
use crate::transport::{SmbTransport, fetch_credentials, open_session, release};

/// A print request as handed over by the host.
pub struct QueuedJob {
    pub id: JobId,
    /// Target printer; `None` when the host could not tell.
    pub printer: Option<PrinterId>,
    pub document: Box<dyn DocumentSource>,
}

impl QueuedJob {
    pub fn new(printer: PrinterId, document: impl DocumentSource + 'static) -> Self {
        Self {
            id: JobId::new(),
            printer: Some(printer),
            document: Box::new(document),
        }
    }
}

impl std::fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedJob")
            .field("id", &self.id)
            .field("printer", &self.printer)
            .field("document", &self.document.describe())
            .finish()
    }
}

/// Controller-side record of a live job.
struct JobEntry {
    state: Mutex<JobState>,
    cancel: CancellationToken,
}

impl JobEntry {
    fn new() -> Self {
        Self {
            state: Mutex::new(JobState::Queued),
            cancel: CancellationToken::new(),
        }
    }

    /// Move to `next` if that is a legal transition from the current state.
    fn advance(&self, next: JobState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Inner<T> {
    transport: Arc<T>,
    credentials: Arc<dyn CredentialProvider>,
    endpoint: Endpoint,
    dispatcher: HostDispatcher,
    jobs: Mutex<HashMap<JobId, Arc<JobEntry>>>,
}

/// Drives print jobs from queued to a single terminal report.
pub struct PrintJobController<T: SmbTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: SmbTransport> Clone for PrintJobController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: SmbTransport> PrintJobController<T> {
    pub fn new(
        transport: Arc<T>,
        credentials: Arc<dyn CredentialProvider>,
        endpoint: Endpoint,
        dispatcher: HostDispatcher,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                credentials,
                endpoint,
                dispatcher,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Jobs that have not finished yet.
    pub fn active_jobs(&self) -> usize {
        self.inner.jobs().len()
    }

    /// Current state of a live job. `None` once it has finished.
    pub fn job_state(&self, id: &JobId) -> Option<JobState> {
        self.inner.jobs().get(id).map(|entry| entry.state())
    }

    /// Accept a job: report it started, then run it in the background.
    pub fn enqueue(&self, job: QueuedJob) {
        let QueuedJob {
            id,
            printer,
            document,
        } = job;

        let entry = Arc::new(JobEntry::new());
        self.inner.jobs().insert(id, Arc::clone(&entry));

        entry.advance(JobState::Started);
        self.inner.dispatcher.dispatch(HostEvent::JobStarted(id));
        info!(job = %id, document = %document.describe(), "job started");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let work = tokio::spawn({
                let inner = Arc::clone(&inner);
                async move { inner.run(id, printer, document).await }
            });
            let abort = work.abort_handle();

            let outcome = tokio::select! {
                biased;
                _ = entry.cancel.cancelled() => {
                    abort.abort();
                    debug!(job = %id, "job task abandoned after cancellation");
                    None
                }
                joined = work => Some(joined.unwrap_or_else(|e| {
                    error!(job = %id, error = %e, "job task died");
                    Err(SpoolError::Unexpected(e.to_string()))
                })),
            };

            if let Some(outcome) = outcome {
                inner.finish(id, &entry, outcome);
            }
            inner.jobs().remove(&id);
        });
    }

    /// Request cancellation. A job that already reached a terminal state is
    /// left alone.
    pub fn cancel(&self, id: &JobId) {
        let Some(entry) = self.inner.jobs().get(id).cloned() else {
            debug!(job = %id, "cancel for unknown or finished job ignored");
            return;
        };

        if entry.advance(JobState::Cancelled) {
            self.inner.dispatcher.dispatch(HostEvent::JobCancelled(*id));
            entry.cancel.cancel();
            info!(job = %id, "job cancelled");
        } else {
            debug!(job = %id, state = ?entry.state(), "cancel after terminal state ignored");
        }
    }
}

impl<T: SmbTransport> Inner<T> {
    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, Arc<JobEntry>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip_all, fields(job = %id))]
    async fn run(
        &self,
        id: JobId,
        printer: Option<PrinterId>,
        document: Box<dyn DocumentSource>,
    ) -> Result<SubmitReport> {
        let credentials = fetch_credentials(&self.credentials)
            .await?
            .ok_or(SpoolError::CredentialsMissing)?;

        let printer_name = printer
            .as_ref()
            .map(PrinterId::local_id)
            .filter(|name| !name.is_empty())
            .ok_or(SpoolError::PrinterUnresolved)?;

        let mut stream = document
            .open()
            .await
            .map_err(|e| SpoolError::DocumentUnavailable(e.to_string()))?;

        let (connection, session) =
            open_session(self.transport.as_ref(), &self.endpoint, &credentials).await?;
        let result = submit(&session, printer_name, &mut stream).await;
        release(connection, session).await;
        result
    }

    /// Issue the terminal report for `outcome`, unless the job already has one.
    fn finish(&self, id: JobId, entry: &JobEntry, outcome: Result<SubmitReport>) {
        let (next, event) = match outcome {
            Ok(report) => {
                info!(job = %id, bytes = report.bytes_sent, sha256 = %report.sha256, "job succeeded");
                (JobState::Succeeded, HostEvent::JobSucceeded { job: id, report })
            }
            Err(e) => {
                warn!(job = %id, error = %e, "job failed");
                (
                    JobState::Failed,
                    HostEvent::JobFailed {
                        job: id,
                        kind: e.kind(),
                        reason: e.to_string(),
                    },
                )
            }
        };

        if entry.advance(next) {
            self.dispatcher.dispatch(event);
        } else {
            debug!(job = %id, state = ?entry.state(), "late outcome dropped, job already terminal");
        }
    }
}

impl<T: SmbTransport> JobHandler for PrintJobController<T> {
    fn on_job_queued(&self, job: QueuedJob) {
        self.enqueue(job);
    }

    fn on_cancel_requested(&self, job: &JobId) {
        self.cancel(job);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use sharespool_core::credentials::StaticCredentials;
    use sharespool_core::error::ErrorKind;
    use sharespool_core::types::{Credentials, ShareDescriptor};
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::document::BytesDocument;
    use crate::testing::{
        DocumentCounters, FakeServer, FakeTransport, Fault, Resource, Stall, TrackedDocument,
        eventually, next_event,
    };

    const HOST: &str = "nts27.comp.nus.edu.sg";

    fn controller(
        server: &FakeServer,
        credentials: Option<Credentials>,
    ) -> (PrintJobController<FakeTransport>, UnboundedReceiver<HostEvent>) {
        let (dispatcher, rx) = HostDispatcher::channel();
        let controller = PrintJobController::new(
            Arc::new(server.transport()),
            Arc::new(StaticCredentials::new(credentials)),
            Endpoint::new(HOST, "nusstu"),
            dispatcher,
        );
        (controller, rx)
    }

    fn printer_server() -> FakeServer {
        FakeServer::new(vec![
            ShareDescriptor::new("HP-Color", 1),
            ShareDescriptor::new("Files", 0),
        ])
    }

    fn logged_in() -> Option<Credentials> {
        Some(Credentials::new("e0123456", "pw"))
    }

    fn hp_color() -> PrinterId {
        PrinterId::new(HOST, "HP-Color")
    }

    /// Collect every event of `job` up to and including its terminal report,
    /// then make sure nothing else arrives for it.
    async fn lifecycle(rx: &mut UnboundedReceiver<HostEvent>, job: JobId) -> Vec<HostEvent> {
        let mut events = Vec::new();
        loop {
            let event = next_event(rx).await;
            assert_eq!(event.job(), Some(job));
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err(), "event after terminal report");
        events
    }

    const REVERSE_ACQUISITION: [Resource; 3] =
        [Resource::Printer, Resource::Session, Resource::Connection];

    fn failure(event: &HostEvent) -> (ErrorKind, &str) {
        match event {
            HostEvent::JobFailed { kind, reason, .. } => (*kind, reason.as_str()),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_job_reports_started_then_succeeded() {
        let server = printer_server();
        let (controller, mut rx) = controller(&server, logged_in());
        let job = QueuedJob::new(hp_color(), BytesDocument::new(b"%PDF-1.7 body".to_vec()));
        let id = job.id;

        controller.on_job_queued(job);
        let events = lifecycle(&mut rx, id).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], HostEvent::JobStarted(_)));
        match &events[1] {
            HostEvent::JobSucceeded { report, .. } => assert_eq!(report.bytes_sent, 13),
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(server.printed("HP-Color"), b"%PDF-1.7 body");
        eventually(|| controller.active_jobs() == 0).await;
        server.assert_balanced();
        assert_eq!(server.release_order(), REVERSE_ACQUISITION);
    }

    #[tokio::test]
    async fn started_is_reported_before_any_io() {
        let server = printer_server().with_stall(Stall::Write);
        let (controller, mut rx) = controller(&server, logged_in());
        let job = QueuedJob::new(hp_color(), BytesDocument::new(vec![1u8; 100]));
        let id = job.id;

        controller.enqueue(job);
        assert!(matches!(rx.try_recv(), Ok(HostEvent::JobStarted(j)) if j == id));
        assert_eq!(controller.job_state(&id), Some(JobState::Started));
        controller.cancel(&id);
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_network() {
        let server = printer_server();
        let (controller, mut rx) = controller(&server, None);
        let job = QueuedJob::new(hp_color(), BytesDocument::new(b"x".to_vec()));
        let id = job.id;

        controller.enqueue(job);
        let events = lifecycle(&mut rx, id).await;

        let (kind, reason) = failure(&events[1]);
        assert_eq!(kind, ErrorKind::CredentialsMissing);
        assert_eq!(reason, "no credentials configured");
        assert_eq!(server.counters().connects(), 0);
    }

    #[tokio::test]
    async fn missing_printer_fails() {
        let server = printer_server();
        let (controller, mut rx) = controller(&server, logged_in());
        for printer in [None, Some(PrinterId::new(HOST, ""))] {
            let job = QueuedJob {
                id: JobId::new(),
                printer,
                document: Box::new(BytesDocument::new(b"x".to_vec())),
            };
            let id = job.id;

            controller.enqueue(job);
            let events = lifecycle(&mut rx, id).await;
            let (kind, reason) = failure(&events[1]);
            assert_eq!(kind, ErrorKind::PrinterUnresolved);
            assert_eq!(reason, "printer information unavailable");
        }
        assert_eq!(server.counters().connects(), 0);
    }

    #[tokio::test]
    async fn unopenable_document_fails_with_detail() {
        let server = printer_server();
        let (controller, mut rx) = controller(&server, logged_in());
        let docs = Arc::new(DocumentCounters::default());
        let job = QueuedJob::new(hp_color(), TrackedDocument::failing_open(&docs));
        let id = job.id;

        controller.enqueue(job);
        let events = lifecycle(&mut rx, id).await;

        let (kind, reason) = failure(&events[1]);
        assert_eq!(kind, ErrorKind::DocumentUnavailable);
        assert_eq!(reason, "failed to access print document: revoked");
        assert_eq!(server.counters().connects(), 0);
    }

    #[tokio::test]
    async fn mid_stream_failure_releases_everything_once() {
        let server = printer_server().with_fault(Fault::WriteAt(10_000));
        let (controller, mut rx) = controller(&server, logged_in());
        let docs = Arc::new(DocumentCounters::default());
        let job = QueuedJob::new(hp_color(), TrackedDocument::new(vec![7u8; 50_000], &docs));
        let id = job.id;

        controller.enqueue(job);
        let events = lifecycle(&mut rx, id).await;

        let (kind, reason) = failure(&events[1]);
        assert_eq!(kind, ErrorKind::PrintTransport);
        assert!(reason.starts_with("print transfer failed:"), "{reason}");
        assert_eq!(server.counters().printers_committed(), 0);
        server.assert_balanced();
        assert_eq!(server.counters().printers_released(), 1);
        assert_eq!(server.release_order(), REVERSE_ACQUISITION);
        assert_eq!(docs.opened.load(Ordering::SeqCst), 1);
        assert_eq!(docs.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_password_closes_only_the_connection() {
        let server = printer_server().with_password("correct-horse");
        let (controller, mut rx) = controller(&server, logged_in());
        let job = QueuedJob::new(hp_color(), BytesDocument::new(b"x".to_vec()));
        let id = job.id;

        controller.enqueue(job);
        let events = lifecycle(&mut rx, id).await;

        let (kind, reason) = failure(&events[1]);
        assert_eq!(kind, ErrorKind::Auth);
        assert_eq!(reason, "authentication rejected: NT_STATUS_WRONG_PASSWORD");
        assert_eq!(server.counters().auths(), 1);
        assert_eq!(server.counters().sessions_released(), 0);
        assert_eq!(server.counters().printers_opened(), 0);
        assert_eq!(server.release_order(), [Resource::Connection]);
        server.assert_balanced();
    }

    #[tokio::test]
    async fn wrong_share_type_is_print_transport_failure() {
        let server = printer_server();
        let (controller, mut rx) = controller(&server, logged_in());
        let job = QueuedJob::new(PrinterId::new(HOST, "Files"), BytesDocument::new(b"x".to_vec()));
        let id = job.id;

        controller.enqueue(job);
        let events = lifecycle(&mut rx, id).await;
        let (kind, reason) = failure(&events[1]);
        assert_eq!(kind, ErrorKind::PrintTransport);
        assert_eq!(reason, "share 'Files' cannot be opened as a printer");
        server.assert_balanced();
    }

    #[tokio::test]
    async fn every_injection_point_yields_one_terminal_report() {
        enum Setup {
            NoCredentials,
            NoPrinter,
            DocumentOpen,
            DocumentRead,
            Server(Fault),
            Success,
        }
        let setups = [
            Setup::NoCredentials,
            Setup::NoPrinter,
            Setup::DocumentOpen,
            Setup::DocumentRead,
            Setup::Server(Fault::Connect),
            Setup::Server(Fault::Authenticate),
            Setup::Server(Fault::Open),
            Setup::Server(Fault::WriteAt(100)),
            Setup::Server(Fault::Close),
            Setup::Success,
        ];

        for setup in setups {
            let server = match setup {
                Setup::Server(fault) => printer_server().with_fault(fault),
                _ => printer_server(),
            };
            let credentials = match setup {
                Setup::NoCredentials => None,
                _ => logged_in(),
            };
            let (controller, mut rx) = controller(&server, credentials);
            let docs = Arc::new(DocumentCounters::default());
            let document = match setup {
                Setup::DocumentOpen => TrackedDocument::failing_open(&docs),
                Setup::DocumentRead => TrackedDocument::new(vec![0u8; 20_000], &docs).failing_read_at(9000),
                _ => TrackedDocument::new(vec![0u8; 20_000], &docs),
            };
            let printer = match setup {
                Setup::NoPrinter => None,
                _ => Some(hp_color()),
            };
            let job = QueuedJob {
                id: JobId::new(),
                printer,
                document: Box::new(document),
            };
            let id = job.id;

            controller.enqueue(job);
            let events = lifecycle(&mut rx, id).await;

            assert_eq!(events.len(), 2);
            assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
            let succeeded = matches!(events[1], HostEvent::JobSucceeded { .. });
            assert_eq!(succeeded, matches!(setup, Setup::Success));

            eventually(|| controller.active_jobs() == 0).await;
            server.assert_balanced();
            assert_eq!(
                docs.released.load(Ordering::SeqCst),
                docs.opened.load(Ordering::SeqCst)
            );
        }
    }

    #[tokio::test]
    async fn cancel_aborts_transfer_in_flight() {
        let server = printer_server().with_stall(Stall::Write);
        let (controller, mut rx) = controller(&server, logged_in());
        let docs = Arc::new(DocumentCounters::default());
        let job = QueuedJob::new(hp_color(), TrackedDocument::new(vec![1u8; 4096], &docs));
        let id = job.id;

        controller.enqueue(job);
        server.wait_until_stalled().await;
        controller.on_cancel_requested(&id);

        let events = lifecycle(&mut rx, id).await;
        assert!(matches!(events[1], HostEvent::JobCancelled(_)));

        eventually(|| server.balanced()).await;
        assert_eq!(server.counters().printers_released(), 1);
        assert_eq!(server.counters().printers_committed(), 0);
        assert_eq!(server.release_order(), REVERSE_ACQUISITION);
        eventually(|| docs.released.load(Ordering::SeqCst) == 1).await;
        eventually(|| controller.active_jobs() == 0).await;
    }

    #[tokio::test]
    async fn cancel_after_success_is_noop() {
        let server = printer_server();
        let (controller, mut rx) = controller(&server, logged_in());
        let job = QueuedJob::new(hp_color(), BytesDocument::new(b"done".to_vec()));
        let id = job.id;

        controller.enqueue(job);
        let events = lifecycle(&mut rx, id).await;
        assert!(matches!(events[1], HostEvent::JobSucceeded { .. }));

        controller.cancel(&id);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_racing_success_reports_once() {
        for _ in 0..50 {
            let server = printer_server();
            let (controller, mut rx) = controller(&server, logged_in());
            let job = QueuedJob::new(hp_color(), BytesDocument::new(vec![3u8; 64]));
            let id = job.id;

            controller.enqueue(job);
            tokio::task::yield_now().await;
            controller.cancel(&id);
            controller.cancel(&id);

            let events = lifecycle(&mut rx, id).await;
            assert_eq!(events.len(), 2);
            assert!(matches!(
                events[1],
                HostEvent::JobSucceeded { .. } | HostEvent::JobCancelled(_)
            ));
            eventually(|| controller.active_jobs() == 0).await;
            eventually(|| server.balanced()).await;
        }
    }

    #[tokio::test]
    async fn jobs_run_independently() {
        let server = printer_server();
        let (controller, mut rx) = controller(&server, logged_in());
        let jobs: Vec<_> = (0..4)
            .map(|i| QueuedJob::new(hp_color(), BytesDocument::new(vec![i as u8; 1000])))
            .collect();
        let ids: Vec<_> = jobs.iter().map(|j| j.id).collect();

        for job in jobs {
            controller.enqueue(job);
        }

        let mut terminal = HashMap::new();
        while terminal.len() < ids.len() {
            let event = next_event(&mut rx).await;
            if event.is_terminal() {
                assert!(terminal.insert(event.job().unwrap(), event).is_none());
            }
        }
        for id in &ids {
            assert!(matches!(terminal[id], HostEvent::JobSucceeded { .. }));
        }
        assert_eq!(server.printed("HP-Color").len(), 4000);
    }
}
