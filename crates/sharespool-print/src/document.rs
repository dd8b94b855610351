// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document sources: where a job's bytes come from.
//
// A source is opened exactly once and yields a sequential byte stream. The
// stream is owned by the job and dropped on every exit path.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::io::AsyncRead;

/// A readable document stream.
pub type DocumentStream = Box<dyn AsyncRead + Send + Unpin>;

/// Future returned by [`DocumentSource::open`].
pub type OpenFuture = Pin<Box<dyn Future<Output = io::Result<DocumentStream>> + Send>>;

/// One document, supplied per job by the host.
pub trait DocumentSource: Send {
    /// Short description for log lines (never the content).
    fn describe(&self) -> String;

    /// Acquire the byte stream. May fail independently of the transport.
    fn open(self: Box<Self>) -> OpenFuture;
}

/// A document on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
}

impl FileDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for FileDocument {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn open(self: Box<Self>) -> OpenFuture {
        Box::pin(async move {
            let file = tokio::fs::File::open(&self.path).await?;
            Ok(Box::new(file) as DocumentStream)
        })
    }
}

/// A document already held in memory.
#[derive(Debug, Clone)]
pub struct BytesDocument {
    bytes: Vec<u8>,
}

impl BytesDocument {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl DocumentSource for BytesDocument {
    fn describe(&self) -> String {
        format!("{} bytes in memory", self.bytes.len())
    }

    fn open(self: Box<Self>) -> OpenFuture {
        Box::pin(async move { Ok(Box::new(io::Cursor::new(self.bytes)) as DocumentStream) })
    }
}
