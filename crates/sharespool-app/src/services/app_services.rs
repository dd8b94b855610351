// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — opens the persistent stores and acts as the host
// print framework for one command.
//
// Each command runs on the main task, which is therefore the callback
// context: controller reports arrive over the dispatcher channel and are
// drained here, and every terminal report is written to the audit log.
// `AuditLog` is `Send` but not `Sync`, so nothing here leaves that task.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use sharespool_core::credentials::CredentialProvider;
use sharespool_core::error::{ErrorKind, Result, SpoolError};
use sharespool_core::types::{JobId, PrinterDescriptor, PrinterId};
use sharespool_core::SpoolConfig;
use sharespool_print::{
    DiscoveryHandler, DiscoverySession, FileDocument, HostDispatcher, HostEvent, JobHandler,
    PrintJobController, QueuedJob, SmbClientTransport, SubmitReport,
};
use sharespool_security::audit::{AuditEntry, AuditLog, actions};
use sharespool_security::EncryptedCredentialStore;

const CONFIG_FILE: &str = "config.json";
const AUDIT_DB: &str = "audit.db";
const CREDENTIALS_DIR: &str = "credentials";

/// Result of one discovery pass as seen by the host.
pub struct Discovery {
    pub session: DiscoverySession<SmbClientTransport>,
    pub printers: Vec<PrinterDescriptor>,
    /// Kind and reason when the pass failed.
    pub failure: Option<(ErrorKind, String)>,
}

/// How a print job ended.
#[derive(Debug)]
pub enum PrintOutcome {
    /// Discovery failed, so no job was queued.
    NotDiscovered { kind: ErrorKind, reason: String },
    Succeeded(SubmitReport),
    Failed { kind: ErrorKind, reason: String },
    Cancelled,
}

/// Persistent services shared by every command.
pub struct AppServices {
    data_dir: PathBuf,
    config: SpoolConfig,
    credentials: Arc<EncryptedCredentialStore>,
    audit: AuditLog,
    transport: Arc<SmbClientTransport>,
}

impl AppServices {
    /// Open config, credential store, and audit log under `data_dir`.
    pub fn init(data_dir: PathBuf) -> Result<Self> {
        info!(path = %data_dir.display(), "initialising app services");

        let config = SpoolConfig::load(data_dir.join(CONFIG_FILE))?;
        let credentials = EncryptedCredentialStore::open(data_dir.join(CREDENTIALS_DIR))?;
        let audit = AuditLog::open(data_dir.join(AUDIT_DB))?;
        let transport = SmbClientTransport::new(&config.smbclient, &config.security);

        Ok(Self {
            data_dir,
            config,
            credentials: Arc::new(credentials),
            audit,
            transport: Arc::new(transport),
        })
    }

    pub fn config(&self) -> &SpoolConfig {
        &self.config
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    // -- Credentials ---------------------------------------------------------

    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        if username.trim().is_empty() {
            return Err(SpoolError::Config("username is empty".into()));
        }
        self.credentials.save_credentials(username.trim(), password)
    }

    pub fn logout(&self) -> Result<()> {
        self.credentials.clear_credentials()
    }

    pub fn logged_in(&self) -> bool {
        self.credentials.get_credentials().is_some()
    }

    // -- History -------------------------------------------------------------

    pub fn history(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        self.audit.recent_entries(limit)
    }

    /// Audit failures never fail the command.
    fn record(&self, action: &str, subject: &str, success: bool, details: &str) {
        if let Err(e) = self.audit.record(action, subject, success, Some(details)) {
            warn!(error = %e, action, "failed to write audit entry");
        }
    }

    // -- Discovery -----------------------------------------------------------

    /// Run one discovery pass and wait for its batch. The session is left
    /// open so the caller can validate against it; destroy it when done.
    pub async fn discover(&self) -> Result<Discovery> {
        let (dispatcher, mut rx) = HostDispatcher::channel();
        let session = DiscoverySession::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.credentials) as Arc<dyn CredentialProvider>,
            self.config.clone(),
            dispatcher,
        );

        session.on_discovery_start(&[]);
        let printers = wait_for_batch(&mut rx).await?;
        let failure = session.last_failure();

        let details = match &failure {
            None => format!("{} printers", printers.len()),
            Some((_, reason)) => reason.clone(),
        };
        self.record(
            actions::DISCOVERY_PUBLISHED,
            &self.config.endpoint.host,
            failure.is_none(),
            &details,
        );

        Ok(Discovery {
            session,
            printers,
            failure,
        })
    }

    // -- Printing ------------------------------------------------------------

    /// Print `path` on the printer share `printer_name` and wait for the
    /// outcome. Ctrl-C requests cancellation once.
    pub async fn print(&self, printer_name: &str, path: &Path) -> Result<PrintOutcome> {
        let discovery = self.discover().await?;
        if let Some((kind, reason)) = discovery.failure {
            discovery.session.on_destroy();
            warn!(%reason, "discovery failed, job not queued");
            return Ok(PrintOutcome::NotDiscovered { kind, reason });
        }
        let wanted = PrinterId::new(&self.config.endpoint.host, printer_name);
        let printer = discovery
            .session
            .on_validate(std::slice::from_ref(&wanted))
            .into_iter()
            .next();
        discovery.session.on_destroy();
        if printer.is_none() {
            warn!(printer = %wanted, "printer was not published by the server");
        }

        let (dispatcher, mut rx) = HostDispatcher::channel();
        let jobs = PrintJobController::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.credentials) as Arc<dyn CredentialProvider>,
            self.config.endpoint.clone(),
            dispatcher,
        );
        let job = QueuedJob {
            id: JobId::new(),
            printer,
            document: Box::new(FileDocument::new(path)),
        };
        let id = job.id;
        jobs.on_job_queued(job);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut cancel_requested = false;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let event = event.ok_or_else(|| {
                        SpoolError::Unexpected("job controller went away".into())
                    })?;
                    if let Some(outcome) = self.on_job_event(printer_name, id, event) {
                        return Ok(outcome);
                    }
                }
                _ = &mut ctrl_c, if !cancel_requested => {
                    cancel_requested = true;
                    info!(job = %id, "cancellation requested");
                    jobs.on_cancel_requested(&id);
                }
            }
        }
    }

    /// Handle one report for job `id`; returns the outcome once terminal.
    fn on_job_event(&self, printer: &str, id: JobId, event: HostEvent) -> Option<PrintOutcome> {
        match event {
            HostEvent::JobStarted(_) => {
                info!(job = %id, printer, "job started");
                None
            }
            HostEvent::JobSucceeded { report, .. } => {
                let details = format!(
                    "job {id}: {} bytes, sha256 {}",
                    report.bytes_sent, report.sha256
                );
                self.record(actions::PRINT_SUCCEEDED, printer, true, &details);
                Some(PrintOutcome::Succeeded(report))
            }
            HostEvent::JobFailed { kind, reason, .. } => {
                self.record(actions::PRINT_FAILED, printer, false, &format!("job {id}: {reason}"));
                Some(PrintOutcome::Failed { kind, reason })
            }
            HostEvent::JobCancelled(_) => {
                self.record(actions::PRINT_CANCELLED, printer, false, &format!("job {id}"));
                Some(PrintOutcome::Cancelled)
            }
            HostEvent::PrintersAdded(_) => {
                debug!("printer batch on job channel ignored");
                None
            }
        }
    }
}

async fn wait_for_batch(rx: &mut UnboundedReceiver<HostEvent>) -> Result<Vec<PrinterDescriptor>> {
    while let Some(event) = rx.recv().await {
        match event {
            HostEvent::PrintersAdded(printers) => return Ok(printers),
            other => debug!(event = ?other, "ignoring non-discovery event"),
        }
    }
    Err(SpoolError::Unexpected("discovery session went away".into()))
}
