// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport session seam.
//
// A transport hands out a connection per endpoint, a connection hands out an
// authenticated session, and a session opens printer handles. Each level is
// released explicitly by consuming `close`/`logoff`/`abort`; implementations
// must also release on drop so that an abandoned future (cancellation) still
// tears everything down.
//
// Only SMB 3.x with mandatory payload encryption is ever negotiated.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, instrument};

use sharespool_core::config::{Dialect, SecurityConfig};
use sharespool_core::credentials::CredentialProvider;
use sharespool_core::error::{Result, SpoolError};
use sharespool_core::types::{Credentials, Endpoint, ShareDescriptor};

/// Factory for connections to a file-and-print server.
pub trait SmbTransport: Send + Sync + 'static {
    type Connection: SmbConnection;

    /// Reach the endpoint and fix the negotiation policy. Unreachable hosts
    /// and negotiation failures are `SpoolError::Transport`.
    fn connect(&self, endpoint: &Endpoint) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// A negotiated, not yet authenticated connection.
pub trait SmbConnection: Send + Sync + 'static {
    type Session: SmbSession;

    /// Session setup. Rejected credentials are `SpoolError::Auth`.
    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Self::Session>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send;
}

/// An authenticated session.
pub trait SmbSession: Send + Sync + 'static {
    type Printer: PrinterHandle;

    /// One srvsvc share enumeration. Failures are `SpoolError::Rpc`.
    fn list_shares(&self) -> impl Future<Output = Result<Vec<ShareDescriptor>>> + Send;

    /// Open `name` under printer access. A share that is not a print queue
    /// is `SpoolError::NotAPrinter`.
    fn open_printer(&self, name: &str) -> impl Future<Output = Result<Self::Printer>> + Send;

    fn logoff(self) -> impl Future<Output = ()> + Send;
}

/// An open print spool file on a printer share.
pub trait PrinterHandle: Send + 'static {
    /// Append raw document bytes to the spool payload.
    fn write(&mut self, chunk: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Commit the spool file. The job is only handed to the queue on success.
    fn close(self) -> impl Future<Output = Result<()>> + Send;

    /// Discard the spool file.
    fn abort(self) -> impl Future<Output = ()> + Send;
}

/// Session type produced by a transport.
pub type SessionOf<T> = <<T as SmbTransport>::Connection as SmbConnection>::Session;

/// Connect and authenticate. The connection is closed again if session
/// setup fails.
#[instrument(skip_all, fields(host = %endpoint.host, domain = %endpoint.domain))]
pub async fn open_session<T: SmbTransport>(
    transport: &T,
    endpoint: &Endpoint,
    credentials: &Credentials,
) -> Result<(T::Connection, SessionOf<T>)> {
    let connection = transport.connect(endpoint).await?;
    match connection.authenticate(credentials).await {
        Ok(session) => {
            debug!("session established");
            Ok((connection, session))
        }
        Err(e) => {
            connection.close().await;
            Err(e)
        }
    }
}

/// Release a session and its connection, in that order.
pub async fn release<C: SmbConnection>(connection: C, session: C::Session) {
    session.logoff().await;
    connection.close().await;
    debug!("session released");
}

/// Fetch credentials off the async workers; providers may touch the disk.
pub async fn fetch_credentials(
    provider: &Arc<dyn CredentialProvider>,
) -> Result<Option<Credentials>> {
    let provider = Arc::clone(provider);
    tokio::task::spawn_blocking(move || provider.get_credentials())
        .await
        .map_err(|e| SpoolError::Unexpected(format!("credential lookup aborted: {e}")))
}

/// Lowest and highest dialect the client offers, after refusing any policy
/// that would allow a legacy dialect or an unencrypted session.
pub fn dialect_range(security: &SecurityConfig) -> Result<(Dialect, Dialect)> {
    if !security.require_encryption {
        return Err(SpoolError::Transport(
            "refusing to negotiate without payload encryption".into(),
        ));
    }
    if let Some(legacy) = security.dialects.iter().find(|d| d.is_legacy()) {
        return Err(SpoolError::Transport(format!(
            "refusing to offer legacy dialect {legacy}"
        )));
    }
    let min = security.dialects.iter().min().copied();
    let max = security.dialects.iter().max().copied();
    match (min, max) {
        (Some(min), Some(max)) => Ok((min, max)),
        _ => Err(SpoolError::Transport("no dialects offered".into())),
    }
}

/// Pick the highest dialect both sides support. The server must also be
/// able to encrypt, otherwise there is nothing safe to fall back to.
pub fn negotiate_dialect(
    security: &SecurityConfig,
    server_dialects: &[Dialect],
    server_encrypts: bool,
) -> Result<Dialect> {
    dialect_range(security)?;
    if !server_encrypts {
        return Err(SpoolError::Transport(
            "server does not support payload encryption".into(),
        ));
    }
    security
        .dialects
        .iter()
        .filter(|d| server_dialects.contains(d))
        .max()
        .copied()
        .ok_or_else(|| SpoolError::Transport("no mutually supported SMB 3.x dialect".into()))
}
