// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Events delivered from a stream filter to its consumer

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

/// Event dispatched to the consumer of a stream filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
    /// Transport started; write() is now accepted
    Start,
    /// Chunk read from the response body
    Data(Bytes),
    /// Transport delivered all data
    Stop,
    /// Session failed; the message is human readable only
    Error(String),
}

impl FilterEvent {
    /// Get the chunk if this is a data event
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            FilterEvent::Data(chunk) => Some(chunk),
            _ => None,
        }
    }

    /// Event name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            FilterEvent::Start => "start",
            FilterEvent::Data(_) => "data",
            FilterEvent::Stop => "stop",
            FilterEvent::Error(_) => "error",
        }
    }
}

/// Push-based event stream of one filter session
///
/// Ends after close(), disconnect() or a failure. Not restartable.
#[derive(Debug)]
pub struct FilterEvents {
    rx: mpsc::UnboundedReceiver<FilterEvent>,
}

impl FilterEvents {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<FilterEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next event, `None` once the session stopped dispatching
    pub async fn next_event(&mut self) -> Option<FilterEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_next_event(&mut self) -> Option<FilterEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued right now
    pub fn drain(&mut self) -> Vec<FilterEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next_event() {
            events.push(event);
        }
        events
    }
}

impl Stream for FilterEvents {
    type Item = FilterEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
