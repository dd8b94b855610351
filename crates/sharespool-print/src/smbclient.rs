// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Production transport backed by Samba's `smbclient`.
//
// `connect` probes the endpoint over TCP and fixes the protocol options
// (SMB 3.0 up to 3.1.1, encryption required). Each later step runs one
// `smbclient` invocation carrying those options:
//
//   authenticate   //host/IPC$ -c exit
//   list_shares    -L //host -g          (srvsvc NetShareEnumAll)
//   open_printer   //host/share -c "print -"   document on stdin
//
// The password is handed over in the `PASSWD` environment variable and
// never appears on the command line. Children are killed on drop, so an
// abandoned print future aborts the transfer.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, instrument, warn};

use sharespool_core::config::{SecurityConfig, SmbClientConfig};
use sharespool_core::error::{Result, SpoolError};
use sharespool_core::types::{Credentials, Endpoint, ShareDescriptor, share_type};

use crate::transport::{PrinterHandle, SmbConnection, SmbSession, SmbTransport, dialect_range};

/// NT status codes meaning the server rejected who we are.
const AUTH_FAILURES: &[&str] = &[
    "NT_STATUS_LOGON_FAILURE",
    "NT_STATUS_WRONG_PASSWORD",
    "NT_STATUS_NO_SUCH_USER",
    "NT_STATUS_ACCESS_DENIED",
    "NT_STATUS_ACCOUNT_LOCKED_OUT",
    "NT_STATUS_ACCOUNT_DISABLED",
    "NT_STATUS_PASSWORD_EXPIRED",
    "NT_STATUS_PASSWORD_MUST_CHANGE",
];

/// Markers for connection and negotiation failures.
const TRANSPORT_FAILURES: &[&str] = &[
    "NT_STATUS_CONNECTION_REFUSED",
    "NT_STATUS_CONNECTION_RESET",
    "NT_STATUS_CONNECTION_DISCONNECTED",
    "NT_STATUS_HOST_UNREACHABLE",
    "NT_STATUS_NETWORK_UNREACHABLE",
    "NT_STATUS_IO_TIMEOUT",
    "NT_STATUS_INVALID_NETWORK_RESPONSE",
    "NT_STATUS_NOT_SUPPORTED",
    "protocol negotiation failed",
];

/// `smbclient`-backed [`SmbTransport`].
#[derive(Debug, Clone)]
pub struct SmbClientTransport {
    program: String,
    connect_timeout: Duration,
    security: SecurityConfig,
}

impl SmbClientTransport {
    pub fn new(client: &SmbClientConfig, security: &SecurityConfig) -> Self {
        Self {
            program: client.program.clone(),
            connect_timeout: Duration::from_secs(client.connect_timeout_secs),
            security: security.clone(),
        }
    }
}

/// Everything needed to run `smbclient` against one server.
#[derive(Debug)]
struct Target {
    program: String,
    host: String,
    port: u16,
    domain: String,
    options: Vec<String>,
}

impl Target {
    fn command(&self, credentials: &Credentials) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-p")
            .arg(self.port.to_string())
            .arg("-W")
            .arg(&self.domain)
            .arg("-U")
            .arg(&credentials.username)
            .args(&self.options)
            .env("PASSWD", &credentials.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run one command to completion, returning stdout. A non-zero exit is
    /// classified from the combined output, with `otherwise` for anything
    /// that is neither an auth nor a connection failure.
    async fn run(
        &self,
        credentials: &Credentials,
        args: &[&str],
        otherwise: fn(String) -> SpoolError,
    ) -> Result<String> {
        let output = self
            .command(credentials)
            .args(args)
            .output()
            .await
            .map_err(|e| SpoolError::Transport(format!("failed to run {}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(&format!("{stderr}\n{stdout}"), otherwise))
    }

    fn service(&self, share: &str) -> String {
        format!("//{}/{}", self.host, share)
    }
}

/// Command-line options fixing dialect range and encryption.
fn protocol_options(security: &SecurityConfig) -> Result<Vec<String>> {
    let (min, max) = dialect_range(security)?;
    Ok(vec![
        format!("--option=client min protocol={min}"),
        format!("--option=client max protocol={max}"),
        "--option=client smb encrypt=required".to_owned(),
    ])
}

impl SmbTransport for SmbClientTransport {
    type Connection = SmbClientConnection;

    #[instrument(skip_all, fields(host = %endpoint.host, port = endpoint.port))]
    async fn connect(&self, endpoint: &Endpoint) -> Result<SmbClientConnection> {
        let options = protocol_options(&self.security)?;
        let addr = (endpoint.host.as_str(), endpoint.port);

        let probe = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                SpoolError::Transport(format!(
                    "connect to {}:{} timed out after {}s",
                    endpoint.host,
                    endpoint.port,
                    self.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                SpoolError::Transport(format!("connect to {}:{}: {e}", endpoint.host, endpoint.port))
            })?;
        drop(probe);

        debug!("endpoint reachable");
        Ok(SmbClientConnection {
            target: Arc::new(Target {
                program: self.program.clone(),
                host: endpoint.host.clone(),
                port: endpoint.port,
                domain: endpoint.domain.clone(),
                options,
            }),
        })
    }
}

pub struct SmbClientConnection {
    target: Arc<Target>,
}

impl SmbConnection for SmbClientConnection {
    type Session = SmbClientSession;

    #[instrument(skip_all, fields(host = %self.target.host))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<SmbClientSession> {
        let ipc = self.target.service("IPC$");
        self.target
            .run(credentials, &[ipc.as_str(), "-c", "exit"], SpoolError::Auth)
            .await?;

        info!("authenticated");
        Ok(SmbClientSession {
            target: Arc::clone(&self.target),
            credentials: credentials.clone(),
        })
    }

    async fn close(self) {
        // Each command owns its own TCP connection; nothing stays open here.
        debug!(host = %self.target.host, "connection closed");
    }
}

pub struct SmbClientSession {
    target: Arc<Target>,
    credentials: Credentials,
}

impl SmbSession for SmbClientSession {
    type Printer = SmbClientPrinter;

    #[instrument(skip_all, fields(host = %self.target.host))]
    async fn list_shares(&self) -> Result<Vec<ShareDescriptor>> {
        let server = format!("//{}", self.target.host);
        let listing = self
            .target
            .run(&self.credentials, &["-L", server.as_str(), "-g"], SpoolError::Rpc)
            .await?;
        parse_share_listing(&listing)
    }

    #[instrument(skip_all, fields(host = %self.target.host, share = %name))]
    async fn open_printer(&self, name: &str) -> Result<SmbClientPrinter> {
        let shares = self.list_shares().await?;
        let is_printer = shares
            .iter()
            .any(|s| s.name == name && s.type_code == share_type::PRINT_QUEUE);
        if !is_printer {
            return Err(SpoolError::NotAPrinter(name.to_owned()));
        }

        let service = self.target.service(name);
        let mut child = self
            .target
            .command(&self.credentials)
            .args([service.as_str(), "-c", "print -"])
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| SpoolError::PrintTransport(format!("failed to start spooler: {e}")))?;

        let stdin = child.stdin.take();
        debug!("spool file opened");
        Ok(SmbClientPrinter {
            share: name.to_owned(),
            child,
            stdin,
        })
    }

    async fn logoff(self) {
        debug!(host = %self.target.host, "session logged off");
    }
}

/// A running `print -` command.
pub struct SmbClientPrinter {
    share: String,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl PrinterHandle for SmbClientPrinter {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SpoolError::PrintTransport("spool file already closed".into()))?;
        stdin
            .write_all(chunk)
            .await
            .map_err(|e| SpoolError::PrintTransport(format!("write to '{}': {e}", self.share)))
    }

    async fn close(mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| SpoolError::PrintTransport(format!("flush '{}': {e}", self.share)))?;
        }
        let output = self
            .child
            .wait_with_output()
            .await
            .map_err(|e| SpoolError::PrintTransport(format!("spooler for '{}': {e}", self.share)))?;

        if output.status.success() {
            debug!(share = %self.share, "spool file committed");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        Err(SpoolError::PrintTransport(last_line(&format!(
            "{stderr}\n{stdout}"
        ))))
    }

    async fn abort(mut self) {
        self.stdin.take();
        if let Err(e) = self.child.kill().await {
            warn!(share = %self.share, error = %e, "failed to kill spooler");
        }
        debug!(share = %self.share, "spool file discarded");
    }
}

/// Parse `smbclient -L -g` output.
///
/// Share lines look like `Printer|HP-Color|Level 3`. Server and workgroup
/// lines, and anything without a `|`, are skipped.
pub fn parse_share_listing(listing: &str) -> Result<Vec<ShareDescriptor>> {
    let mut shares = Vec::new();
    for line in listing.lines() {
        let line = line.trim();
        if !line.contains('|') {
            continue;
        }
        let mut fields = line.splitn(3, '|');
        let kind = fields.next().unwrap_or_default();
        let type_code = match kind {
            "Disk" => share_type::DISK,
            "Printer" => share_type::PRINT_QUEUE,
            "Device" => share_type::DEVICE,
            "IPC" => share_type::IPC,
            "Server" | "Workgroup" => continue,
            other => {
                return Err(SpoolError::Rpc(format!("unknown share type '{other}'")));
            }
        };
        let name = fields.next().unwrap_or_default();
        if name.is_empty() {
            return Err(SpoolError::Rpc(format!("share line without a name: {line}")));
        }
        let comment = fields.next().filter(|c| !c.is_empty()).map(str::to_owned);

        shares.push(ShareDescriptor {
            name: name.to_owned(),
            type_code,
            comment,
        });
    }
    Ok(shares)
}

/// Map a failed command's output to the error taxonomy.
pub fn classify_failure(output: &str, otherwise: fn(String) -> SpoolError) -> SpoolError {
    let detail = last_line(output);
    if AUTH_FAILURES.iter().any(|s| output.contains(s)) {
        SpoolError::Auth(detail)
    } else if TRANSPORT_FAILURES.iter().any(|s| output.contains(s)) {
        SpoolError::Transport(detail)
    } else {
        otherwise(detail)
    }
}

fn last_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .unwrap_or("exited without output")
        .to_owned()
}
