// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print submitter — stream one document into one printer share.
//
// The document is read sequentially in 8 KiB chunks and written as-is; no
// reformatting, no buffering of the whole payload. A failure at any point
// discards the spool file and is returned unchanged. Partial transfers are
// never retried here.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument, warn};

use sharespool_core::error::{Result, SpoolError};
use sharespool_security::integrity::StreamDigest;

use crate::transport::{PrinterHandle, SmbSession};

/// Chunk size for document streaming.
pub const CHUNK_SIZE: usize = 8192;

/// What was delivered to the printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub bytes_sent: u64,
    /// SHA-256 of exactly the bytes sent, lowercase hex.
    pub sha256: String,
}

/// Open `printer_name` on `session` and stream `document` into it.
#[instrument(skip(session, document), fields(printer = %printer_name))]
pub async fn submit<S, R>(session: &S, printer_name: &str, document: &mut R) -> Result<SubmitReport>
where
    S: SmbSession,
    R: AsyncRead + Unpin + ?Sized,
{
    let mut handle = session.open_printer(printer_name).await?;

    match stream_into(&mut handle, document).await {
        Ok(digest) => {
            handle.close().await?;
            let fingerprint = digest.finish();
            info!(
                bytes = fingerprint.bytes,
                sha256 = %fingerprint.sha256,
                "document delivered"
            );
            Ok(SubmitReport {
                bytes_sent: fingerprint.bytes,
                sha256: fingerprint.sha256,
            })
        }
        Err(e) => {
            warn!(error = %e, "transfer failed, discarding spool file");
            handle.abort().await;
            Err(e)
        }
    }
}

async fn stream_into<P, R>(handle: &mut P, document: &mut R) -> Result<StreamDigest>
where
    P: PrinterHandle,
    R: AsyncRead + Unpin + ?Sized,
{
    let mut digest = StreamDigest::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = document.read(&mut buf).await.map_err(|e| {
            SpoolError::DocumentUnavailable(format!(
                "read failed after {} bytes: {e}",
                digest.bytes()
            ))
        })?;
        if n == 0 {
            break;
        }
        handle.write(&buf[..n]).await?;
        digest.update(&buf[..n]);
        debug!(sent = digest.bytes(), "chunk written");
    }
    Ok(digest)
}
