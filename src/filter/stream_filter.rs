// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Consumer handle of a response body filter session

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;

use super::event::FilterEvents;
use super::state::SharedChannel;
use super::status::StreamFilterStatus;
use crate::error::Result;
use crate::network::{RequestDetails, RequestId, RequestRegistry};

/// Interception session bound to one in-flight response
///
/// Chunks read from the transport arrive on the [`FilterEvents`] returned
/// with the filter. Whatever the consumer passes to [`write`](Self::write)
/// becomes the response body seen downstream. Clones share the session.
///
/// Dropping the last handle of a session that is still active disconnects
/// it, so the rest of the response reaches the sink unmodified.
#[derive(Clone)]
pub struct StreamFilter {
    inner: Arc<FilterHandle>,
}

struct FilterHandle {
    channel: SharedChannel,
    request_id: RequestId,
    owner_id: String,
}

impl Drop for FilterHandle {
    fn drop(&mut self) {
        let mut channel = self.channel.lock();
        let active = channel
            .filter_status()
            .map(|s| !s.is_terminal())
            .unwrap_or(false);

        if active {
            tracing::warn!(
                request_id = %self.request_id,
                owner_id = %self.owner_id,
                "Stream filter dropped while active, disconnecting"
            );
            let _ = channel.disconnect();
        }
    }
}

impl std::fmt::Debug for StreamFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFilter")
            .field("request_id", &self.inner.request_id)
            .field("owner_id", &self.inner.owner_id)
            .field("status", &self.status())
            .finish()
    }
}

impl StreamFilter {
    /// Create a filter for an in-flight request
    ///
    /// Must happen before the response body starts. At most one active
    /// filter exists per request.
    pub fn create(
        registry: &RequestRegistry,
        request_id: &RequestId,
        owner_id: &str,
    ) -> Result<(StreamFilter, FilterEvents)> {
        registry.filter_response_data(request_id, owner_id)
    }

    pub(crate) fn attach(channel: SharedChannel, owner_id: &str) -> Result<(StreamFilter, FilterEvents)> {
        let (events, request_id) = {
            let mut state = channel.lock();
            let events = state.attach(owner_id)?;
            (events, state.request_id().clone())
        };

        let filter = StreamFilter {
            inner: Arc::new(FilterHandle {
                channel,
                request_id,
                owner_id: owner_id.to_string(),
            }),
        };
        Ok((filter, events))
    }

    /// Id of the filtered request
    pub fn request_id(&self) -> &RequestId {
        &self.inner.request_id
    }

    /// Name of the observer that created the filter
    pub fn owner_id(&self) -> &str {
        &self.inner.owner_id
    }

    /// Details of the filtered request
    pub fn details(&self) -> RequestDetails {
        self.inner.channel.lock().details().clone()
    }

    /// Current status
    pub fn status(&self) -> StreamFilterStatus {
        self.inner
            .channel
            .lock()
            .filter_status()
            .unwrap_or_default()
    }

    /// Description of the failure, once the status is `failed`
    pub fn error(&self) -> Option<String> {
        self.inner.channel.lock().filter_error()
    }

    /// Bytes written but not yet forwarded downstream
    pub fn pending_bytes(&self) -> usize {
        self.inner.channel.lock().pending_bytes()
    }

    /// Bytes read from the transport while suspended, not yet delivered
    pub fn held_bytes(&self) -> usize {
        self.inner.channel.lock().held_bytes()
    }

    /// Receiver notified on every status change
    pub fn watch_status(&self) -> watch::Receiver<StreamFilterStatus> {
        let receiver = self.inner.channel.lock().status_receiver();
        match receiver {
            Some(rx) => rx,
            // Attached filters always have a slot
            None => watch::channel(StreamFilterStatus::Uninitialized).1,
        }
    }

    /// Pause delivery of chunks
    pub fn suspend(&self) -> Result<()> {
        self.inner.channel.lock().suspend()
    }

    /// Continue delivery where it paused
    pub fn resume(&self) -> Result<()> {
        self.inner.channel.lock().resume()
    }

    /// Flush pending output, then finalize the response body
    pub fn close(&self) -> Result<()> {
        self.inner.channel.lock().close()
    }

    /// Stop filtering; the rest of the response passes through unmodified
    pub fn disconnect(&self) -> Result<()> {
        self.inner.channel.lock().disconnect()
    }

    /// Send a chunk downstream
    ///
    /// Forwarded at once while transferring, queued while suspended or
    /// after the transport finished.
    pub fn write(&self, data: impl Into<Bytes>) -> Result<()> {
        self.inner.channel.lock().write(data.into())
    }
}
