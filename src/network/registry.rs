// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Registry of in-flight requests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::event::{RequestDetails, RequestId};
use super::filter::RequestFilter;
use crate::error::{Error, Result};
use crate::filter::state::{ChannelState, SharedChannel};
use crate::filter::{FilterConfig, FilterEvents, FilterMetrics, StreamFilter};
use crate::transport::{ResponseBody, ResponseSink};

/// Tracks in-flight requests and binds filters to them
///
/// The transport registers each request with [`begin`](Self::begin) before
/// reading its body. Observers then claim the body with
/// [`filter_response_data`](Self::filter_response_data). Clones share the
/// same requests and metrics.
pub struct RequestRegistry {
    requests: Arc<DashMap<RequestId, SharedChannel>>,
    next_id: Arc<AtomicU64>,
    config: FilterConfig,
    metrics: Arc<FilterMetrics>,
}

impl RequestRegistry {
    /// Create a registry with default limits
    pub fn new() -> Self {
        Self::with_config(FilterConfig::default())
    }

    /// Create a registry with custom limits
    pub fn with_config(config: FilterConfig) -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            config,
            metrics: Arc::new(FilterMetrics::new()),
        }
    }

    /// Allocate a fresh request id
    pub fn next_request_id(&self) -> RequestId {
        RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed).to_string())
    }

    /// Register a request whose body will be written to `sink`
    pub fn begin(&self, details: RequestDetails, sink: impl ResponseSink + 'static) -> Result<ResponseBody> {
        let request_id = details.request_id.clone();

        let channel = match self.requests.entry(request_id.clone()) {
            Entry::Occupied(_) => return Err(Error::DuplicateRequest(request_id)),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    request_id = %request_id,
                    url = %details.url,
                    resource_type = %details.resource_type,
                    "Request registered"
                );
                let channel = ChannelState::new(
                    details,
                    Box::new(sink),
                    self.config.clone(),
                    self.metrics.clone(),
                )
                .shared();
                slot.insert(channel.clone());
                channel
            }
        };

        self.metrics.record_request_started();
        Ok(ResponseBody::new(channel, request_id, self.requests.clone()))
    }

    /// Create a stream filter for a request
    pub fn filter_response_data(
        &self,
        request_id: &RequestId,
        owner_id: &str,
    ) -> Result<(StreamFilter, FilterEvents)> {
        let channel = self
            .requests
            .get(request_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::RequestNotFound(request_id.clone()))?;

        StreamFilter::attach(channel, owner_id)
    }

    /// Details of an in-flight request
    pub fn details(&self, request_id: &RequestId) -> Option<RequestDetails> {
        let channel = self.requests.get(request_id).map(|entry| entry.value().clone())?;
        let details = channel.lock().details().clone();
        Some(details)
    }

    /// Ids of all in-flight requests, sorted
    pub fn in_flight(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.requests.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// In-flight requests accepted by a request filter
    pub fn matching(&self, filter: &RequestFilter) -> Vec<RequestDetails> {
        let channels: Vec<SharedChannel> = self.requests.iter().map(|entry| entry.value().clone()).collect();

        let mut matched: Vec<RequestDetails> = channels
            .iter()
            .map(|channel| channel.lock().details().clone())
            .filter(|details| filter.matches(details))
            .collect();
        matched.sort_by(|a, b| a.request_id.cmp(&b.request_id));
        matched
    }

    /// Number of in-flight requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if no request is in flight
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Limits applied to new requests
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<FilterMetrics> {
        &self.metrics
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RequestRegistry {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
            next_id: self.next_id.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::StreamFilterStatus;
    use crate::network::ResourceType;
    use crate::transport::MemorySink;

    fn details(id: &str, url: &str, resource_type: ResourceType) -> RequestDetails {
        RequestDetails::new(id, url, "GET", resource_type)
    }

    #[test]
    fn test_unknown_request() {
        let registry = RequestRegistry::new();
        let err = registry.filter_response_data(&"nope".into(), "ext").unwrap_err();
        assert!(matches!(err, Error::RequestNotFound(_)));
    }

    #[test]
    fn test_duplicate_request() {
        let registry = RequestRegistry::new();
        let _body = registry
            .begin(details("1", "https://a.example/", ResourceType::MainFrame), MemorySink::new())
            .unwrap();

        let err = registry
            .begin(details("1", "https://a.example/", ResourceType::MainFrame), MemorySink::new())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRequest(_)));
    }

    #[test]
    fn test_second_filter_conflicts() {
        let registry = RequestRegistry::new();
        let _body = registry
            .begin(details("1", "https://a.example/", ResourceType::MainFrame), MemorySink::new())
            .unwrap();

        let (first, _events) = registry.filter_response_data(&"1".into(), "first").unwrap();
        let err = registry.filter_response_data(&"1".into(), "second").unwrap_err();
        match err {
            Error::SessionClaimConflict { owner_id, .. } => assert_eq!(owner_id, "first"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(first.status(), StreamFilterStatus::Uninitialized);
    }

    #[test]
    fn test_finished_filter_not_reclaimable() {
        let registry = RequestRegistry::new();
        let _body = registry
            .begin(details("1", "https://a.example/", ResourceType::MainFrame), MemorySink::new())
            .unwrap();

        let (filter, _events) = registry.filter_response_data(&"1".into(), "first").unwrap();
        filter.close().unwrap();

        let err = registry.filter_response_data(&"1".into(), "second").unwrap_err();
        assert!(matches!(err, Error::NotEligible { .. }));
    }

    #[test]
    fn test_started_body_not_eligible() {
        let registry = RequestRegistry::new();
        let body = registry
            .begin(details("1", "https://a.example/", ResourceType::MainFrame), MemorySink::new())
            .unwrap();
        body.start().unwrap();

        let err = registry.filter_response_data(&"1".into(), "late").unwrap_err();
        assert!(matches!(err, Error::NotEligible { .. }));
    }

    #[test]
    fn test_matching_and_in_flight() {
        let registry = RequestRegistry::new();
        let _a = registry
            .begin(details("1", "https://a.example/", ResourceType::MainFrame), MemorySink::new())
            .unwrap();
        let _b = registry
            .begin(details("2", "https://a.example/app.js", ResourceType::Script), MemorySink::new())
            .unwrap();

        assert_eq!(registry.in_flight(), vec![RequestId::new("1"), RequestId::new("2")]);

        let scripts = registry.matching(&RequestFilter::all().types(vec![ResourceType::Script]));
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].url, "https://a.example/app.js");

        let exact = registry.matching(&RequestFilter::new(["https://a.example/"]));
        assert_eq!(exact[0].request_id.as_str(), "1");
    }

    #[test]
    fn test_next_request_id_unique() {
        let registry = RequestRegistry::new();
        let other = registry.clone();

        let a = registry.next_request_id();
        let b = other.next_request_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_clone_shares_requests() {
        let registry = RequestRegistry::new();
        let other = registry.clone();
        let _body = registry
            .begin(details("1", "https://a.example/", ResourceType::Image), MemorySink::new())
            .unwrap();

        assert!(other.details(&"1".into()).is_some());
        assert_eq!(other.metrics().report().requests_started, 1);
    }
}
