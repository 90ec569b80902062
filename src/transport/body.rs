// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Transport-facing handle of a response body

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

use crate::error::Result;
use crate::filter::state::{SharedChannel, TransportPhase};
use crate::filter::StreamFilterStatus;
use crate::network::RequestId;

/// What happened to a transport signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the filter's consumer
    Dispatched,
    /// Held while the filter is suspended
    Held {
        /// Bytes held after this signal
        buffered: usize,
    },
    /// Went straight to the sink
    PassedThrough,
    /// Dropped, the filter no longer takes input
    Discarded,
}

/// Handle the network layer uses to feed one response body
///
/// Signals must arrive in order: `start`, any number of `data`, then
/// `finish` or `fail`. Dropping the handle before either fails the
/// attached filter.
pub struct ResponseBody {
    channel: SharedChannel,
    request_id: RequestId,
    requests: Arc<DashMap<RequestId, SharedChannel>>,
    done: bool,
}

impl ResponseBody {
    pub(crate) fn new(
        channel: SharedChannel,
        request_id: RequestId,
        requests: Arc<DashMap<RequestId, SharedChannel>>,
    ) -> Self {
        Self {
            channel,
            request_id,
            requests,
            done: false,
        }
    }

    /// Id of the request this body belongs to
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Signal that the response body begins
    pub fn start(&self) -> Result<Delivery> {
        self.channel.lock().on_start()
    }

    /// Signal one chunk read from the network
    pub fn data(&self, chunk: impl Into<Bytes>) -> Result<Delivery> {
        self.channel.lock().on_data(chunk.into())
    }

    /// Signal end of data
    ///
    /// A rejected signal still consumes the handle, so the drop fails the
    /// attached filter.
    pub fn finish(mut self) -> Result<Delivery> {
        let delivery = self.channel.lock().on_finish();
        self.done = delivery.is_ok();
        delivery
    }

    /// Signal a network failure
    pub fn fail(mut self, message: impl Into<String>) -> Result<Delivery> {
        let delivery = self.channel.lock().on_error(message.into());
        self.done = delivery.is_ok();
        delivery
    }

    /// Wait until the attached filter is not suspended
    ///
    /// Resolves at once without a filter.
    pub async fn ready(&self) {
        let receiver = self.channel.lock().status_receiver();
        if let Some(mut rx) = receiver {
            // Sender lives as long as the channel; an error means it is gone
            let _ = rx.wait_for(|s| *s != StreamFilterStatus::Suspended).await;
        }
    }

    /// Check if reading should pause
    pub fn is_suspended(&self) -> bool {
        self.channel.lock().filter_status() == Some(StreamFilterStatus::Suspended)
    }

    /// Check if the response body has started
    pub fn is_started(&self) -> bool {
        self.channel.lock().phase() != TransportPhase::Pending
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody")
            .field("request_id", &self.request_id)
            .field("done", &self.done)
            .finish()
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(request_id = %self.request_id, "Response body dropped before end of data");
            self.channel.lock().on_abandoned();
        }
        self.requests.remove(&self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::filter::FilterEvent;
    use crate::network::{RequestDetails, RequestRegistry, ResourceType};
    use crate::transport::{ChannelSink, MemorySink, SinkChunk};

    fn begin(registry: &RequestRegistry) -> (ResponseBody, MemorySink) {
        let sink = MemorySink::new();
        let details = RequestDetails::new("b1", "https://example.com/a.css", "GET", ResourceType::Stylesheet);
        (registry.begin(details, sink.clone()).unwrap(), sink)
    }

    #[test]
    fn test_unfiltered_body_passes_through() {
        let registry = RequestRegistry::new();
        let (body, sink) = begin(&registry);

        assert_eq!(body.start().unwrap(), Delivery::PassedThrough);
        assert_eq!(body.data("body{}").unwrap(), Delivery::PassedThrough);
        assert!(!body.is_suspended());
        body.finish().unwrap();

        assert_eq!(&sink.contents()[..], b"body{}");
        assert!(sink.is_closed());
        assert_eq!(registry.metrics().report().bytes_passed_through, 6);
    }

    #[test]
    fn test_unfiltered_sink_left_open() {
        let config = crate::filter::FilterConfig::new().close_unfiltered_sinks(false);
        let registry = RequestRegistry::with_config(config);
        let (body, sink) = begin(&registry);

        body.start().unwrap();
        body.finish().unwrap();
        assert!(!sink.is_closed());
    }

    #[test]
    fn test_out_of_order_signals() {
        let registry = RequestRegistry::new();
        let (body, _sink) = begin(&registry);

        let err = body.data("early").unwrap_err();
        assert!(err.is_transport());

        body.start().unwrap();
        assert!(matches!(body.start(), Err(Error::TransportFailure(_))));
        assert!(body.is_started());
    }

    #[test]
    fn test_finish_before_start_fails_filter() {
        let registry = RequestRegistry::new();
        let (body, _sink) = begin(&registry);
        let (filter, mut events) = registry.filter_response_data(&"b1".into(), "ext").unwrap();

        let err = body.finish().unwrap_err();
        assert!(err.is_transport());

        assert_eq!(filter.status(), StreamFilterStatus::Failed);
        assert_eq!(
            filter.error().as_deref(),
            Some("response body dropped before end of data")
        );
        assert!(matches!(events.try_next_event(), Some(FilterEvent::Error(_))));
        assert!(events.try_next_event().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failure_closes_unfiltered_sink() {
        let registry = RequestRegistry::new();
        let (sink, mut rx) = ChannelSink::new();
        let details = RequestDetails::new("b2", "https://example.com/feed", "GET", ResourceType::XmlHttpRequest);
        let body = registry.begin(details, sink).unwrap();

        body.start().unwrap();
        body.data("partial").unwrap();
        assert_eq!(body.fail("connection reset").unwrap(), Delivery::Discarded);

        assert_eq!(rx.try_recv().unwrap(), SinkChunk::Data(Bytes::from_static(b"partial")));
        assert_eq!(rx.try_recv().unwrap(), SinkChunk::Closed);
    }

    #[test]
    fn test_failure_after_disconnect_closes_sink() {
        let registry = RequestRegistry::new();
        let (body, sink) = begin(&registry);
        let (filter, _events) = registry.filter_response_data(&"b1".into(), "ext").unwrap();

        body.start().unwrap();
        filter.disconnect().unwrap();
        body.data("a{}").unwrap();
        body.fail("connection reset").unwrap();

        assert_eq!(filter.status(), StreamFilterStatus::Disconnected);
        assert_eq!(&sink.contents()[..], b"a{}");
        assert!(sink.is_closed());
    }

    #[test]
    fn test_finish_unregisters() {
        let registry = RequestRegistry::new();
        let (body, _sink) = begin(&registry);
        assert_eq!(registry.len(), 1);

        body.start().unwrap();
        body.finish().unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_ready_without_filter() {
        let registry = RequestRegistry::new();
        let (body, _sink) = begin(&registry);
        body.ready().await;
    }
}
