// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Output destinations for response bodies

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Downstream destination of a response body
///
/// Receives either the filter's output or, without a filter, the
/// transport's chunks unmodified. `close` is called at most once.
pub trait ResponseSink: Send {
    /// Forward one chunk downstream
    fn write(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Finalize the output
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory sink, clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<BytesMut>>,
    writes: Arc<Mutex<usize>>,
    closed: Arc<AtomicBool>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far
    pub fn contents(&self) -> Bytes {
        self.buf.lock().clone().freeze()
    }

    /// Number of write calls received
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }

    /// Check if close() was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ResponseSink for MemorySink {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        self.buf.lock().extend_from_slice(chunk);
        *self.writes.lock() += 1;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Sink over any `io::Write` (files, stdout)
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ResponseSink for WriterSink<W> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.writer.write_all(chunk)
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Item received from a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkChunk {
    /// Forwarded bytes
    Data(Bytes),
    /// Output finalized
    Closed,
}

/// Sink forwarding chunks to an async receiver
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkChunk>,
}

impl ChannelSink {
    /// Create a sink and its receiving end
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResponseSink for ChannelSink {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.tx
            .send(SinkChunk::Data(Bytes::copy_from_slice(chunk)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver dropped"))
    }

    fn close(&mut self) -> io::Result<()> {
        self.tx
            .send(SinkChunk::Closed)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver dropped"))
    }
}
