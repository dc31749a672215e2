use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

/// Frames queued ahead of a slow reader before new ones are dropped.
const FRAME_QUEUE: usize = 64;

/// Wrap one serialized protocol message as an SSE frame. No `event:` field;
/// the trailing blank line terminates the frame.
pub fn frame(message: &serde_json::Value) -> String {
    format!("data: {message}\n\n")
}

/// Write half of one session's outbound stream.
///
/// Open until `close()`; the close is terminal and happens exactly once.
/// Writes after close are dropped with a log line rather than an error,
/// since in-flight dispatches race the close by design.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<Option<Bytes>>,
    closed: Arc<AtomicBool>,
    label: String,
}

impl FrameSender {
    /// Create a sender plus the byte stream that backs the HTTP response
    /// body. The stream ends when `close()` is called (after any queued
    /// frames flush) or when every sender clone is dropped.
    pub fn channel(
        label: impl Into<String>,
    ) -> (Self, impl Stream<Item = Result<Bytes, Infallible>> + 'static) {
        let (tx, rx) = mpsc::channel::<Option<Bytes>>(FRAME_QUEUE);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Some(Some(bytes)) => Some((Ok(bytes), rx)),
                _ => None,
            }
        });
        let sender = Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
            label: label.into(),
        };
        (sender, stream)
    }

    /// Queue one message as an SSE frame. Returns false when the frame was
    /// dropped: transport closed, reader gone, or queue full.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(session_id = %self.label, "dropping frame written after close");
            return false;
        }
        let value = match serde_json::to_value(message) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(session_id = %self.label, error = %e, "unserializable outbound message");
                return false;
            }
        };
        match self.tx.try_send(Some(Bytes::from(frame(&value)))) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session_id = %self.label, "frame queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.closed.store(true, Ordering::Release);
                tracing::debug!(session_id = %self.label, "reader gone, marking transport closed");
                false
            }
        }
    }

    /// Close the write side. Idempotent; queued frames still flush before
    /// the body stream ends.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(None).await;
        tracing::debug!(session_id = %self.label, "transport closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Incremental splitter for the inbound byte stream: one protocol message
/// per line. Lines that are empty or carry an SSE field prefix are echo
/// artifacts, not payload; malformed JSON is logged and skipped so a bad
/// line never aborts the stream.
#[derive(Default)]
pub struct LineDecoder {
    buffer: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk; returns the messages completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<serde_json::Value> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut messages = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(message) = parse_line(&line) {
                messages.push(message);
            }
        }
        messages
    }

    /// Flush a trailing line that arrived without a newline terminator.
    pub fn finish(&mut self) -> Option<serde_json::Value> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(line: &str) -> Option<serde_json::Value> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("event:") || trimmed.starts_with("data:") {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed inbound line");
            None
        }
    }
}
