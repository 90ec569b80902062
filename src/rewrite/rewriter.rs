// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Body rewriter trait and chain
//!
//! Middleware over a stream filter session. Each rewriter sees the chunks
//! the previous one produced; whatever leaves the last rewriter is written
//! downstream.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::filter::{FilterEvent, FilterEvents, StreamFilter, StreamFilterStatus};
use crate::network::RequestDetails;

/// Response body rewriter
///
/// # Example
///
/// ```rust,no_run
/// use siivila::rewrite::{BodyRewriter, RewriteAction};
/// use siivila::network::RequestDetails;
/// use async_trait::async_trait;
/// use bytes::Bytes;
///
/// struct Uppercase;
///
/// #[async_trait]
/// impl BodyRewriter for Uppercase {
///     async fn on_data(&self, _details: &RequestDetails, chunk: Bytes) -> RewriteAction {
///         RewriteAction::Continue(Bytes::from(chunk.to_ascii_uppercase()))
///     }
/// }
/// ```
#[async_trait]
pub trait BodyRewriter: Send + Sync {
    /// Called when the response body starts
    async fn on_start(&self, _details: &RequestDetails) {}

    /// Called for every chunk
    async fn on_data(&self, _details: &RequestDetails, chunk: Bytes) -> RewriteAction {
        RewriteAction::Continue(chunk)
    }

    /// Called at end of data, may emit trailing output
    async fn on_stop(&self, _details: &RequestDetails) -> Option<Bytes> {
        None
    }

    /// Called when the session failed
    async fn on_error(&self, _details: &RequestDetails, _message: &str) {}

    /// Called when filtering ends before end of data
    ///
    /// Returns input still held back, unmodified. Release any per-request
    /// state here; no other callback follows for this request.
    async fn on_flush(&self, _details: &RequestDetails) -> Option<Bytes> {
        None
    }

    /// Filter - return true if this rewriter should see the request
    fn should_rewrite(&self, _details: &RequestDetails) -> bool {
        true
    }

    /// Priority - higher priority rewriters run first
    fn priority(&self) -> i32 {
        0
    }
}

/// Outcome of a rewriter for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteAction {
    /// Pass the (possibly modified) chunk on
    Continue(Bytes),
    /// Swallow the chunk
    Skip,
    /// Stop filtering, the rest of the body passes through unmodified
    Disconnect,
    /// End the response body here
    Close,
}

/// Rewriter chain - runs rewriters against a filter session
pub struct RewriterChain {
    rewriters: Vec<Arc<dyn BodyRewriter>>,
}

impl Default for RewriterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriterChain {
    /// Create a new empty chain
    pub fn new() -> Self {
        Self {
            rewriters: Vec::new(),
        }
    }

    /// Add a rewriter
    pub fn add<R: BodyRewriter + 'static>(&mut self, rewriter: R) {
        self.add_shared(Arc::new(rewriter));
    }

    /// Add a rewriter the caller keeps a handle to
    pub fn add_shared(&mut self, rewriter: Arc<dyn BodyRewriter>) {
        self.rewriters.push(rewriter);
        // Sort by priority (highest first)
        self.rewriters.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Number of rewriters
    pub fn len(&self) -> usize {
        self.rewriters.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.rewriters.is_empty()
    }

    /// Drive a filter session until it ends
    ///
    /// Closes the filter once the transport finished. Returns the final
    /// status, or [`Error::TransportFailure`] if the session failed.
    pub async fn run(&self, filter: &StreamFilter, mut events: FilterEvents) -> Result<StreamFilterStatus> {
        let details = filter.details();
        let active: Vec<Arc<dyn BodyRewriter>> = self
            .rewriters
            .iter()
            .filter(|r| r.should_rewrite(&details))
            .cloned()
            .collect();

        if active.is_empty() {
            tracing::debug!(request_id = %details.request_id, "No rewriter applies, disconnecting");
            filter.disconnect()?;
            return Ok(filter.status());
        }

        while let Some(event) = events.next_event().await {
            match event {
                FilterEvent::Start => {
                    for rewriter in &active {
                        rewriter.on_start(&details).await;
                    }
                }
                FilterEvent::Data(chunk) => {
                    let (action, at) = pipe(&active, 0, &details, chunk).await;
                    if apply(filter, &active, &details, action, at).await? {
                        return Ok(filter.status());
                    }
                }
                FilterEvent::Stop => {
                    for (i, rewriter) in active.iter().enumerate() {
                        let Some(tail) = rewriter.on_stop(&details).await else {
                            continue;
                        };
                        let (action, at) = pipe(&active, i + 1, &details, tail).await;
                        if apply(filter, &active, &details, action, at).await? {
                            return Ok(filter.status());
                        }
                    }
                    filter.close()?;
                    return Ok(filter.status());
                }
                FilterEvent::Error(message) => {
                    for rewriter in &active {
                        rewriter.on_error(&details, &message).await;
                    }
                    return Err(Error::transport(message));
                }
            }
        }

        // Session ended from outside, nothing left to write to
        for rewriter in &active {
            rewriter.on_flush(&details).await;
        }
        Ok(filter.status())
    }
}

/// Feed a chunk through the rewriters from `from` on
///
/// Returns the action and the index of the rewriter that produced it,
/// `rewriters.len()` if every rewriter continued.
async fn pipe(
    rewriters: &[Arc<dyn BodyRewriter>],
    from: usize,
    details: &RequestDetails,
    chunk: Bytes,
) -> (RewriteAction, usize) {
    let mut chunk = chunk;
    for (i, rewriter) in rewriters.iter().enumerate().skip(from) {
        match rewriter.on_data(details, chunk).await {
            RewriteAction::Continue(next) => chunk = next,
            action => return (action, i),
        }
    }
    (RewriteAction::Continue(chunk), rewriters.len())
}

/// Apply the action rewriter `at` produced, true if the session ended
async fn apply(
    filter: &StreamFilter,
    rewriters: &[Arc<dyn BodyRewriter>],
    details: &RequestDetails,
    action: RewriteAction,
    at: usize,
) -> Result<bool> {
    match action {
        RewriteAction::Continue(chunk) => {
            write(filter, chunk)?;
            Ok(false)
        }
        RewriteAction::Skip => Ok(false),
        RewriteAction::Disconnect => {
            // Input held further down the chain arrived first
            for rewriter in rewriters.iter().rev() {
                if let Some(held) = rewriter.on_flush(details).await {
                    write(filter, held)?;
                }
            }
            filter.disconnect()?;
            Ok(true)
        }
        RewriteAction::Close => {
            // Everything past `at` saw its input before the body ended
            for (i, rewriter) in rewriters.iter().enumerate().skip(at + 1) {
                let Some(tail) = rewriter.on_stop(details).await else {
                    continue;
                };
                if let (RewriteAction::Continue(chunk), _) = pipe(rewriters, i + 1, details, tail).await {
                    write(filter, chunk)?;
                }
            }
            for rewriter in rewriters.iter().take(at + 1) {
                rewriter.on_flush(details).await;
            }
            filter.close()?;
            Ok(true)
        }
    }
}

/// Write rewritten output, a failed session becomes a transport failure
fn write(filter: &StreamFilter, chunk: Bytes) -> Result<()> {
    if chunk.is_empty() {
        return Ok(());
    }
    match filter.write(chunk) {
        Ok(()) => Ok(()),
        Err(Error::WriteRejected {
            status: StreamFilterStatus::Failed,
        }) => Err(Error::transport(
            filter.error().unwrap_or_else(|| "stream filter failed".to_string()),
        )),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{RequestRegistry, ResourceType};
    use crate::transport::{MemorySink, ResponseBody};

    struct Uppercase;

    #[async_trait]
    impl BodyRewriter for Uppercase {
        async fn on_data(&self, _details: &RequestDetails, chunk: Bytes) -> RewriteAction {
            RewriteAction::Continue(Bytes::from(chunk.to_ascii_uppercase()))
        }
    }

    /// Appends a marker after every chunk and a trailer at the end
    struct Marker(&'static str, i32);

    #[async_trait]
    impl BodyRewriter for Marker {
        async fn on_data(&self, _details: &RequestDetails, chunk: Bytes) -> RewriteAction {
            let mut out = chunk.to_vec();
            out.extend_from_slice(self.0.as_bytes());
            RewriteAction::Continue(Bytes::from(out))
        }

        async fn on_stop(&self, _details: &RequestDetails) -> Option<Bytes> {
            Some(Bytes::from(format!("<{}>", self.0)))
        }

        fn priority(&self) -> i32 {
            self.1
        }
    }

    struct DisconnectAfterFirst;

    #[async_trait]
    impl BodyRewriter for DisconnectAfterFirst {
        async fn on_data(&self, _details: &RequestDetails, chunk: Bytes) -> RewriteAction {
            if chunk.starts_with(b"stop") {
                RewriteAction::Disconnect
            } else {
                RewriteAction::Continue(chunk)
            }
        }
    }

    struct OnlyScripts;

    #[async_trait]
    impl BodyRewriter for OnlyScripts {
        fn should_rewrite(&self, details: &RequestDetails) -> bool {
            details.resource_type == ResourceType::Script
        }
    }

    fn begin(registry: &RequestRegistry) -> (ResponseBody, MemorySink) {
        let sink = MemorySink::new();
        let details = RequestDetails::new("c1", "https://example.com/", "GET", ResourceType::MainFrame);
        (registry.begin(details, sink.clone()).unwrap(), sink)
    }

    #[test]
    fn test_chain_sorted_by_priority() {
        let mut chain = RewriterChain::new();
        chain.add(Marker("low", -10));
        chain.add(Marker("high", 10));
        chain.add(Uppercase);

        let priorities: Vec<i32> = chain.rewriters.iter().map(|r| r.priority()).collect();
        assert_eq!(priorities, vec![10, 0, -10]);
    }

    #[tokio::test]
    async fn test_chain_rewrites_body() {
        let registry = RequestRegistry::new();
        let (body, sink) = begin(&registry);
        let (filter, events) = registry.filter_response_data(&"c1".into(), "chain").unwrap();

        body.start().unwrap();
        body.data("ab").unwrap();
        body.data("cd").unwrap();
        body.finish().unwrap();

        let mut chain = RewriterChain::new();
        chain.add(Uppercase);
        let status = chain.run(&filter, events).await.unwrap();

        assert_eq!(status, StreamFilterStatus::Closed);
        assert_eq!(&sink.contents()[..], b"ABCD");
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_trailing_output_flows_downstream() {
        let registry = RequestRegistry::new();
        let (body, sink) = begin(&registry);
        let (filter, events) = registry.filter_response_data(&"c1".into(), "chain").unwrap();

        body.start().unwrap();
        body.data("x").unwrap();
        body.finish().unwrap();

        let mut chain = RewriterChain::new();
        chain.add(Marker("a", 2));
        chain.add(Marker("b", 1));
        chain.run(&filter, events).await.unwrap();

        // Trailer of "a" passes through "b"
        assert_eq!(&sink.contents()[..], b"xab<a>b<b>");
    }

    #[tokio::test]
    async fn test_disconnect_action() {
        let registry = RequestRegistry::new();
        let (body, sink) = begin(&registry);
        let (filter, events) = registry.filter_response_data(&"c1".into(), "chain").unwrap();

        body.start().unwrap();
        body.data("keep").unwrap();
        body.data("stop").unwrap();

        let mut chain = RewriterChain::new();
        chain.add(DisconnectAfterFirst);
        let status = chain.run(&filter, events).await.unwrap();
        assert_eq!(status, StreamFilterStatus::Disconnected);

        body.data("raw").unwrap();
        body.finish().unwrap();
        assert_eq!(&sink.contents()[..], b"keepraw");
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_error_event_becomes_transport_failure() {
        let registry = RequestRegistry::new();
        let (body, _sink) = begin(&registry);
        let (filter, events) = registry.filter_response_data(&"c1".into(), "chain").unwrap();

        body.start().unwrap();
        body.fail("connection reset").unwrap();

        let mut chain = RewriterChain::new();
        chain.add(Uppercase);
        let err = chain.run(&filter, events).await.unwrap_err();
        assert!(matches!(err, Error::TransportFailure(ref m) if m == "connection reset"));
    }

    #[tokio::test]
    async fn test_no_applicable_rewriter_disconnects() {
        let registry = RequestRegistry::new();
        let (body, sink) = begin(&registry);
        let (filter, events) = registry.filter_response_data(&"c1".into(), "chain").unwrap();

        let mut chain = RewriterChain::new();
        chain.add(OnlyScripts);
        let status = chain.run(&filter, events).await.unwrap();
        assert_eq!(status, StreamFilterStatus::Disconnected);

        body.start().unwrap();
        body.data("<html>").unwrap();
        assert_eq!(&sink.contents()[..], b"<html>");
    }
}
