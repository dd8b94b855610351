// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Discovery session controller.
//
// One session per host discovery episode. `start` spawns a single pass:
// credentials, connect, authenticate, enumerate, filter, build descriptors.
// A completed pass replaces the cache and publishes the whole set as one
// batch; anything else publishes an empty batch. `validate` only ever reads
// the cache. `stop`/`destroy` cancel the pass in flight and clear the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use sharespool_core::config::SpoolConfig;
use sharespool_core::credentials::CredentialProvider;
use sharespool_core::error::{ErrorKind, Result, SpoolError};
use sharespool_core::types::{DiscoveryState, PrinterDescriptor, PrinterId};

use crate::host::{DiscoveryHandler, HostDispatcher, HostEvent};
use crate::shares::{filter_printers, list_shares};
use crate::transport::{SmbTransport, fetch_credentials, open_session, release};

/// Mutable part of a session, guarded by one lock.
struct Shared {
    state: DiscoveryState,
    cache: HashMap<PrinterId, PrinterDescriptor>,
    /// Cancels the pass currently in flight.
    pass: CancellationToken,
    /// Why the last pass failed. Never reported to the host.
    failure: Option<(ErrorKind, String)>,
}

struct Inner<T> {
    transport: Arc<T>,
    credentials: Arc<dyn CredentialProvider>,
    config: SpoolConfig,
    dispatcher: HostDispatcher,
    shared: Mutex<Shared>,
}

/// Discovery controller for one host discovery session.
pub struct DiscoverySession<T: SmbTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: SmbTransport> Clone for DiscoverySession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: SmbTransport> DiscoverySession<T> {
    pub fn new(
        transport: Arc<T>,
        credentials: Arc<dyn CredentialProvider>,
        config: SpoolConfig,
        dispatcher: HostDispatcher,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                credentials,
                config,
                dispatcher,
                shared: Mutex::new(Shared {
                    state: DiscoveryState::Idle,
                    cache: HashMap::new(),
                    pass: CancellationToken::new(),
                    failure: None,
                }),
            }),
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.inner.lock().state
    }

    /// Kind and reason of the last failed pass, for diagnostics.
    pub fn last_failure(&self) -> Option<(ErrorKind, String)> {
        self.inner.lock().failure.clone()
    }

    /// Published printers, sorted by id.
    pub fn printers(&self) -> Vec<PrinterDescriptor> {
        let mut printers: Vec<_> = self.inner.lock().cache.values().cloned().collect();
        printers.sort_by(|a, b| a.id().cmp(b.id()));
        printers
    }

    /// Start a discovery pass in the background. Ignored while a pass is
    /// already running or after the session was stopped.
    pub fn start(&self) {
        let token = {
            let mut shared = self.inner.lock();
            if !shared.state.can_transition_to(DiscoveryState::Discovering) {
                debug!(state = ?shared.state, "discovery start ignored");
                return;
            }
            shared.state = DiscoveryState::Discovering;
            shared.pass = CancellationToken::new();
            shared.pass.clone()
        };

        info!(host = %self.inner.config.endpoint.host, "discovery started");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("discovery pass abandoned");
                    return;
                }
                outcome = inner.run_pass() => outcome,
            };
            inner.finish_pass(&token, outcome);
        });
    }

    /// Subset of `ids` present in the cache, in request order.
    pub fn validate(&self, ids: &[PrinterId]) -> Vec<PrinterId> {
        let shared = self.inner.lock();
        ids.iter()
            .filter(|id| shared.cache.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Abandon any pass in flight and clear the cache. Idempotent.
    pub fn stop(&self) {
        let mut shared = self.inner.lock();
        shared.pass.cancel();
        shared.cache.clear();
        if shared.state != DiscoveryState::Stopped {
            shared.state = DiscoveryState::Stopped;
            info!("discovery session stopped");
        }
    }

    pub fn destroy(&self) {
        self.stop();
    }
}

impl<T: SmbTransport> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip_all, fields(host = %self.config.endpoint.host))]
    async fn run_pass(&self) -> Result<Vec<PrinterDescriptor>> {
        let credentials = fetch_credentials(&self.credentials)
            .await?
            .ok_or(SpoolError::CredentialsMissing)?;

        let endpoint = &self.config.endpoint;
        let (connection, session) =
            open_session(self.transport.as_ref(), endpoint, &credentials).await?;
        let listed = list_shares(&session).await;
        release(connection, session).await;

        let printers = filter_printers(&listed?, &self.config.filter);
        debug!(printers = printers.len(), "shares filtered");

        Ok(printers
            .into_iter()
            .map(|share| {
                PrinterDescriptor::new(
                    PrinterId::new(&endpoint.host, &share.name),
                    share.name,
                    self.config.capabilities.clone(),
                )
            })
            .collect())
    }

    /// Commit a pass, unless it was cancelled or superseded meanwhile.
    fn finish_pass(&self, token: &CancellationToken, outcome: Result<Vec<PrinterDescriptor>>) {
        let mut shared = self.lock();
        if token.is_cancelled() || shared.state != DiscoveryState::Discovering {
            debug!("stale discovery result discarded");
            return;
        }

        let batch = match outcome {
            Ok(printers) => {
                shared.cache = printers
                    .iter()
                    .map(|p| (p.id().clone(), p.clone()))
                    .collect();
                shared.state = DiscoveryState::Published;
                shared.failure = None;
                info!(count = printers.len(), "printers published");
                printers
            }
            Err(e) => {
                shared.cache.clear();
                shared.state = DiscoveryState::Failed;
                shared.failure = Some((e.kind(), e.to_string()));
                warn!(error = %e, "discovery failed, publishing no printers");
                Vec::new()
            }
        };
        // Dispatch under the lock so a concurrent stop cannot slip in between.
        self.dispatcher.dispatch(HostEvent::PrintersAdded(batch));
    }
}

impl<T: SmbTransport> DiscoveryHandler for DiscoverySession<T> {
    fn on_discovery_start(&self, priority_hints: &[PrinterId]) {
        if !priority_hints.is_empty() {
            debug!(hints = priority_hints.len(), "priority hints ignored");
        }
        self.start();
    }

    fn on_discovery_stop(&self) {
        debug!("discovery stop: nothing to do, status is not polled");
    }

    fn on_validate(&self, ids: &[PrinterId]) -> Vec<PrinterId> {
        self.validate(ids)
    }

    fn on_start_tracking(&self, id: &PrinterId) {
        debug!(printer = %id, "printer tracking not supported");
    }

    fn on_stop_tracking(&self, id: &PrinterId) {
        debug!(printer = %id, "printer tracking not supported");
    }

    fn on_destroy(&self) {
        self.destroy();
    }
}
