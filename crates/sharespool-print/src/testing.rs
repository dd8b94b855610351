// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory SMB server for unit tests.
//
// Injects a failure at any step, can stall enumeration or writes until the
// future is dropped, and counts how often each resource is released and in
// which order.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{Notify, mpsc};

use sharespool_core::config::{Dialect, SecurityConfig};
use sharespool_core::error::{Result, SpoolError};
use sharespool_core::types::{Credentials, Endpoint, ShareDescriptor, share_type};

use crate::document::{DocumentSource, DocumentStream, OpenFuture};
use crate::host::HostEvent;
use crate::transport::{PrinterHandle, SmbConnection, SmbSession, SmbTransport, negotiate_dialect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Connect,
    Authenticate,
    Enumerate,
    Open,
    /// Fail the write that would take the total past this many bytes.
    WriteAt(usize),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    Enumerate,
    Write,
}

#[derive(Debug, Default)]
pub struct Counters {
    connects: AtomicUsize,
    auths: AtomicUsize,
    enumerations: AtomicUsize,
    connections_opened: AtomicUsize,
    sessions_opened: AtomicUsize,
    printers_opened: AtomicUsize,
    printers_committed: AtomicUsize,
    printers_released: AtomicUsize,
    sessions_released: AtomicUsize,
    connections_released: AtomicUsize,
}

impl Counters {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
    pub fn auths(&self) -> usize {
        self.auths.load(Ordering::SeqCst)
    }
    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
    pub fn printers_opened(&self) -> usize {
        self.printers_opened.load(Ordering::SeqCst)
    }
    pub fn printers_committed(&self) -> usize {
        self.printers_committed.load(Ordering::SeqCst)
    }
    pub fn printers_released(&self) -> usize {
        self.printers_released.load(Ordering::SeqCst)
    }
    pub fn sessions_released(&self) -> usize {
        self.sessions_released.load(Ordering::SeqCst)
    }
    pub fn connections_released(&self) -> usize {
        self.connections_released.load(Ordering::SeqCst)
    }

    fn opened(&self, resource: Resource) -> &AtomicUsize {
        match resource {
            Resource::Connection => &self.connections_opened,
            Resource::Session => &self.sessions_opened,
            Resource::Printer => &self.printers_opened,
        }
    }

    fn released(&self, resource: Resource) -> &AtomicUsize {
        match resource {
            Resource::Connection => &self.connections_released,
            Resource::Session => &self.sessions_released,
            Resource::Printer => &self.printers_released,
        }
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

#[derive(Debug)]
struct ServerState {
    shares: Vec<ShareDescriptor>,
    dialects: Vec<Dialect>,
    encrypts: bool,
    password: Option<String>,
    fault: Option<Fault>,
    stall: Option<Stall>,
    stalled: Notify,
    counters: Counters,
    releases: Mutex<Vec<Resource>>,
    printed: Mutex<HashMap<String, Vec<u8>>>,
}

/// Configurable fake server. Configure first, then call [`transport`].
///
/// [`transport`]: FakeServer::transport
pub struct FakeServer {
    state: Arc<ServerState>,
}

impl FakeServer {
    pub fn new(shares: Vec<ShareDescriptor>) -> Self {
        Self {
            state: Arc::new(ServerState {
                shares,
                dialects: vec![Dialect::Smb210, Dialect::Smb300, Dialect::Smb311],
                encrypts: true,
                password: None,
                fault: None,
                stall: None,
                stalled: Notify::new(),
                counters: Counters::default(),
                releases: Mutex::new(Vec::new()),
                printed: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn configure(&mut self) -> &mut ServerState {
        Arc::get_mut(&mut self.state).expect("configure the fake before handing out transports")
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.configure().fault = Some(fault);
        self
    }

    pub fn with_stall(mut self, stall: Stall) -> Self {
        self.configure().stall = Some(stall);
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.configure().password = Some(password.to_owned());
        self
    }

    pub fn with_dialects(mut self, dialects: &[Dialect], encrypts: bool) -> Self {
        let state = self.configure();
        state.dialects = dialects.to_vec();
        state.encrypts = encrypts;
        self
    }

    pub fn transport(&self) -> FakeTransport {
        FakeTransport {
            state: Arc::clone(&self.state),
            security: SecurityConfig::default(),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.state.counters
    }

    pub fn printed(&self, share: &str) -> Vec<u8> {
        self.state
            .printed
            .lock()
            .unwrap()
            .get(share)
            .cloned()
            .unwrap_or_default()
    }

    /// Every release so far, oldest first.
    pub fn release_order(&self) -> Vec<Resource> {
        self.state.releases.lock().unwrap().clone()
    }

    /// Resolves once a stalled step has been reached.
    pub async fn wait_until_stalled(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.state.stalled.notified())
            .await
            .expect("fake server never reached its stall point");
    }

    /// Whether every acquired connection, session and printer handle has
    /// been released exactly once.
    pub fn balanced(&self) -> bool {
        let c = self.counters();
        [Resource::Connection, Resource::Session, Resource::Printer]
            .into_iter()
            .all(|r| c.released(r).load(Ordering::SeqCst) == c.opened(r).load(Ordering::SeqCst))
    }

    pub fn assert_balanced(&self) {
        let c = self.counters();
        for resource in [Resource::Connection, Resource::Session, Resource::Printer] {
            assert_eq!(
                c.released(resource).load(Ordering::SeqCst),
                c.opened(resource).load(Ordering::SeqCst),
                "{resource:?} releases"
            );
        }
    }
}

impl ServerState {
    async fn maybe_stall(&self, at: Stall) {
        if self.stall == Some(at) {
            self.stalled.notify_one();
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Connection,
    Session,
    Printer,
}

/// Marks a resource released once, either explicitly or on drop.
#[derive(Debug)]
struct Release {
    state: Arc<ServerState>,
    resource: Resource,
    done: bool,
}

impl Release {
    fn acquire(state: &Arc<ServerState>, resource: Resource) -> Self {
        bump(state.counters.opened(resource));
        Self {
            state: Arc::clone(state),
            resource,
            done: false,
        }
    }

    fn fire(&mut self) {
        if !self.done {
            self.done = true;
            bump(self.state.counters.released(self.resource));
            self.state.releases.lock().unwrap().push(self.resource);
        }
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        self.fire();
    }
}

#[derive(Debug, Clone)]
pub struct FakeTransport {
    state: Arc<ServerState>,
    security: SecurityConfig,
}

impl SmbTransport for FakeTransport {
    type Connection = FakeConnection;

    async fn connect(&self, _endpoint: &Endpoint) -> Result<FakeConnection> {
        bump(&self.state.counters.connects);
        if self.state.fault == Some(Fault::Connect) {
            return Err(SpoolError::Transport("connection refused".into()));
        }
        negotiate_dialect(&self.security, &self.state.dialects, self.state.encrypts)?;
        Ok(FakeConnection {
            state: Arc::clone(&self.state),
            release: Release::acquire(&self.state, Resource::Connection),
        })
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    state: Arc<ServerState>,
    release: Release,
}

impl SmbConnection for FakeConnection {
    type Session = FakeSession;

    async fn authenticate(&self, credentials: &Credentials) -> Result<FakeSession> {
        bump(&self.state.counters.auths);
        if self.state.fault == Some(Fault::Authenticate) {
            return Err(SpoolError::Auth("NT_STATUS_LOGON_FAILURE".into()));
        }
        if let Some(expected) = &self.state.password {
            if *expected != credentials.password {
                return Err(SpoolError::Auth("NT_STATUS_WRONG_PASSWORD".into()));
            }
        }
        Ok(FakeSession {
            state: Arc::clone(&self.state),
            release: Release::acquire(&self.state, Resource::Session),
        })
    }

    async fn close(mut self) {
        self.release.fire();
    }
}

#[derive(Debug)]
pub struct FakeSession {
    state: Arc<ServerState>,
    release: Release,
}

impl SmbSession for FakeSession {
    type Printer = FakePrinter;

    async fn list_shares(&self) -> Result<Vec<ShareDescriptor>> {
        bump(&self.state.counters.enumerations);
        self.state.maybe_stall(Stall::Enumerate).await;
        if self.state.fault == Some(Fault::Enumerate) {
            return Err(SpoolError::Rpc("NetShareEnumAll rejected".into()));
        }
        Ok(self.state.shares.clone())
    }

    async fn open_printer(&self, name: &str) -> Result<FakePrinter> {
        if self.state.fault == Some(Fault::Open) {
            return Err(SpoolError::PrintTransport(format!("open '{name}' failed")));
        }
        let is_printer = self
            .state
            .shares
            .iter()
            .any(|s| s.name == name && s.type_code == share_type::PRINT_QUEUE);
        if !is_printer {
            return Err(SpoolError::NotAPrinter(name.to_owned()));
        }
        Ok(FakePrinter {
            state: Arc::clone(&self.state),
            share: name.to_owned(),
            written: 0,
            release: Release::acquire(&self.state, Resource::Printer),
        })
    }

    async fn logoff(mut self) {
        self.release.fire();
    }
}

#[derive(Debug)]
pub struct FakePrinter {
    state: Arc<ServerState>,
    share: String,
    written: usize,
    release: Release,
}

impl PrinterHandle for FakePrinter {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.state.maybe_stall(Stall::Write).await;
        if let Some(Fault::WriteAt(limit)) = self.state.fault {
            if self.written + chunk.len() > limit {
                return Err(SpoolError::PrintTransport(format!(
                    "connection reset after {} bytes",
                    self.written
                )));
            }
        }
        self.state
            .printed
            .lock()
            .unwrap()
            .entry(self.share.clone())
            .or_default()
            .extend_from_slice(chunk);
        self.written += chunk.len();
        Ok(())
    }

    async fn close(mut self) -> Result<()> {
        self.release.fire();
        if self.state.fault == Some(Fault::Close) {
            return Err(SpoolError::PrintTransport("spool file close failed".into()));
        }
        bump(&self.state.counters.printers_committed);
        Ok(())
    }

    async fn abort(mut self) {
        self.release.fire();
    }
}

/// Reader over `data` that errors once `fail_at` bytes have been read.
pub struct BrokenReader {
    data: Vec<u8>,
    pos: usize,
    fail_at: Option<usize>,
}

impl BrokenReader {
    pub fn new(data: Vec<u8>, fail_at: usize) -> Self {
        Self {
            data,
            pos: 0,
            fail_at: Some(fail_at),
        }
    }

    pub fn healthy(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            fail_at: None,
        }
    }
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.fail_at.is_some_and(|f| this.pos >= f) {
            return Poll::Ready(Err(io::Error::other("device unplugged")));
        }
        let end = this
            .fail_at
            .map_or(this.data.len(), |f| f.min(this.data.len()));
        let n = buf.remaining().min(end - this.pos);
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Counts how often tracked documents were opened and their streams dropped.
#[derive(Debug, Default)]
pub struct DocumentCounters {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
}

/// A document source whose stream reports its own release.
pub struct TrackedDocument {
    data: Vec<u8>,
    fail_open: bool,
    fail_read_at: Option<usize>,
    counters: Arc<DocumentCounters>,
}

impl TrackedDocument {
    pub fn new(data: impl Into<Vec<u8>>, counters: &Arc<DocumentCounters>) -> Self {
        Self {
            data: data.into(),
            fail_open: false,
            fail_read_at: None,
            counters: Arc::clone(counters),
        }
    }

    pub fn failing_open(counters: &Arc<DocumentCounters>) -> Self {
        Self {
            fail_open: true,
            ..Self::new(Vec::new(), counters)
        }
    }

    pub fn failing_read_at(mut self, at: usize) -> Self {
        self.fail_read_at = Some(at);
        self
    }
}

impl DocumentSource for TrackedDocument {
    fn describe(&self) -> String {
        "tracked test document".into()
    }

    fn open(self: Box<Self>) -> OpenFuture {
        Box::pin(async move {
            if self.fail_open {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "revoked"));
            }
            bump(&self.counters.opened);
            let reader = match self.fail_read_at {
                Some(at) => BrokenReader::new(self.data, at),
                None => BrokenReader::healthy(self.data),
            };
            Ok(Box::new(TrackedStream {
                reader,
                counters: Arc::clone(&self.counters),
            }) as DocumentStream)
        })
    }
}

struct TrackedStream {
    reader: BrokenReader,
    counters: Arc<DocumentCounters>,
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        bump(&self.counters.released);
    }
}

/// Next host event, failing the test if none arrives.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<HostEvent>) -> HostEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a host event")
        .expect("host channel closed")
}

/// Wait until `condition` holds, polling the scheduler.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}
