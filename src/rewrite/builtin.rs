// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Built-in body rewriters

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use regex::bytes::Regex;

use super::rewriter::{BodyRewriter, RewriteAction};
use crate::error::Result;
use crate::network::{RequestDetails, RequestFilter, RequestId};

/// Body captured by [`BodyCapture`]
#[derive(Debug, Clone, Default)]
pub struct CapturedBody {
    pub url: String,
    pub body: Vec<u8>,
    /// Capture stopped at the size limit
    pub truncated: bool,
    /// End of data was seen
    pub complete: bool,
}

impl CapturedBody {
    /// Body as text, invalid UTF-8 replaced
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Records response bodies while passing them on unchanged
pub struct BodyCapture {
    max_bytes: usize,
    bodies: Arc<DashMap<RequestId, CapturedBody>>,
}

impl BodyCapture {
    /// Capture up to `max_bytes` of every body
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            bodies: Arc::new(DashMap::new()),
        }
    }

    /// Body captured for a request
    pub fn captured(&self, request_id: &RequestId) -> Option<CapturedBody> {
        self.bodies.get(request_id).map(|b| b.value().clone())
    }

    /// Shared handle to every captured body
    pub fn bodies(&self) -> Arc<DashMap<RequestId, CapturedBody>> {
        self.bodies.clone()
    }
}

impl Default for BodyCapture {
    fn default() -> Self {
        Self::new(10 * 1024 * 1024)
    }
}

#[async_trait]
impl BodyRewriter for BodyCapture {
    async fn on_start(&self, details: &RequestDetails) {
        self.bodies.insert(
            details.request_id.clone(),
            CapturedBody {
                url: details.url.clone(),
                ..Default::default()
            },
        );
    }

    async fn on_data(&self, details: &RequestDetails, chunk: Bytes) -> RewriteAction {
        if let Some(mut captured) = self.bodies.get_mut(&details.request_id) {
            let room = self.max_bytes.saturating_sub(captured.body.len());
            if chunk.len() > room {
                captured.truncated = true;
            }
            let take = chunk.len().min(room);
            captured.body.extend_from_slice(&chunk[..take]);
        }
        RewriteAction::Continue(chunk)
    }

    async fn on_stop(&self, details: &RequestDetails) -> Option<Bytes> {
        if let Some(mut captured) = self.bodies.get_mut(&details.request_id) {
            captured.complete = true;
        }
        None
    }
}

/// Response body logger
pub struct BodyLogger {
    /// Log every chunk, not just start and end
    pub log_chunks: bool,
    /// Filter by URL substring
    pub url_filter: Option<String>,
    received: DashMap<RequestId, usize>,
}

impl BodyLogger {
    pub fn new() -> Self {
        Self {
            log_chunks: false,
            url_filter: None,
            received: DashMap::new(),
        }
    }

    pub fn log_chunks(mut self, enabled: bool) -> Self {
        self.log_chunks = enabled;
        self
    }

    pub fn url_filter(mut self, filter: impl Into<String>) -> Self {
        self.url_filter = Some(filter.into());
        self
    }
}

impl Default for BodyLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BodyRewriter for BodyLogger {
    fn should_rewrite(&self, details: &RequestDetails) -> bool {
        if let Some(ref filter) = self.url_filter {
            details.url.contains(filter)
        } else {
            true
        }
    }

    async fn on_start(&self, details: &RequestDetails) {
        self.received.insert(details.request_id.clone(), 0);
        tracing::info!(
            request_id = %details.request_id,
            url = %details.url,
            resource_type = %details.resource_type,
            "Response body"
        );
    }

    async fn on_data(&self, details: &RequestDetails, chunk: Bytes) -> RewriteAction {
        if let Some(mut total) = self.received.get_mut(&details.request_id) {
            *total += chunk.len();
        }
        if self.log_chunks {
            tracing::debug!(request_id = %details.request_id, bytes = chunk.len(), "Chunk");
        }
        RewriteAction::Continue(chunk)
    }

    async fn on_stop(&self, details: &RequestDetails) -> Option<Bytes> {
        let total = self
            .received
            .remove(&details.request_id)
            .map(|(_, total)| total)
            .unwrap_or(0);
        tracing::info!(request_id = %details.request_id, bytes = total, "Response body complete");
        None
    }

    async fn on_error(&self, details: &RequestDetails, message: &str) {
        self.received.remove(&details.request_id);
        tracing::warn!(request_id = %details.request_id, error = %message, "Response body failed");
    }

    async fn on_flush(&self, details: &RequestDetails) -> Option<Bytes> {
        if let Some((_, total)) = self.received.remove(&details.request_id) {
            tracing::info!(request_id = %details.request_id, bytes = total, "Stopped filtering response body");
        }
        None
    }

    fn priority(&self) -> i32 {
        -100 // Low priority - see the final output
    }
}

#[derive(Default)]
struct ReplaceBuffer {
    data: BytesMut,
    overflowed: bool,
}

/// Regex search and replace over whole response bodies
///
/// Buffers each body so matches spanning chunk boundaries are found.
/// Bodies larger than the buffer limit are passed on unmodified.
pub struct RegexReplace {
    pattern: Regex,
    replacement: Vec<u8>,
    max_buffer: usize,
    only: Option<RequestFilter>,
    buffers: DashMap<RequestId, ReplaceBuffer>,
}

impl RegexReplace {
    /// Replace every match of `pattern`; `$1`-style groups are expanded
    pub fn new(pattern: &str, replacement: impl Into<Vec<u8>>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
            max_buffer: 8 * 1024 * 1024,
            only: None,
            buffers: DashMap::new(),
        })
    }

    /// Set the per-body buffer limit
    pub fn max_buffer(mut self, limit: usize) -> Self {
        self.max_buffer = limit;
        self
    }

    /// Only rewrite requests accepted by a request filter
    pub fn only(mut self, filter: RequestFilter) -> Self {
        self.only = Some(filter);
        self
    }
}

#[async_trait]
impl BodyRewriter for RegexReplace {
    fn should_rewrite(&self, details: &RequestDetails) -> bool {
        self.only
            .as_ref()
            .map(|f| f.matches(details))
            .unwrap_or(true)
    }

    async fn on_data(&self, details: &RequestDetails, chunk: Bytes) -> RewriteAction {
        let mut buffer = self
            .buffers
            .entry(details.request_id.clone())
            .or_insert_with(ReplaceBuffer::default);
        if buffer.overflowed {
            return RewriteAction::Continue(chunk);
        }

        buffer.data.extend_from_slice(&chunk);
        if buffer.data.len() > self.max_buffer {
            tracing::debug!(
                request_id = %details.request_id,
                limit = self.max_buffer,
                "Body too large to rewrite, passing through"
            );
            buffer.overflowed = true;
            return RewriteAction::Continue(buffer.data.split().freeze());
        }
        RewriteAction::Skip
    }

    async fn on_stop(&self, details: &RequestDetails) -> Option<Bytes> {
        let (_, buffer) = self.buffers.remove(&details.request_id)?;
        if buffer.overflowed {
            return None;
        }
        let replaced = self.pattern.replace_all(&buffer.data, self.replacement.as_slice());
        Some(Bytes::from(replaced.into_owned()))
    }

    async fn on_error(&self, details: &RequestDetails, _message: &str) {
        self.buffers.remove(&details.request_id);
    }

    async fn on_flush(&self, details: &RequestDetails) -> Option<Bytes> {
        let (_, buffer) = self.buffers.remove(&details.request_id)?;
        if buffer.data.is_empty() {
            return None;
        }
        Some(buffer.data.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::StreamFilterStatus;
    use crate::network::{RequestRegistry, ResourceType};
    use crate::rewrite::RewriterChain;
    use crate::transport::MemorySink;

    /// Ends filtering with `action` on a chunk starting with `marker`
    struct EndOn {
        marker: &'static str,
        action: RewriteAction,
    }

    #[async_trait]
    impl BodyRewriter for EndOn {
        async fn on_data(&self, _details: &RequestDetails, chunk: Bytes) -> RewriteAction {
            if chunk.starts_with(self.marker.as_bytes()) {
                self.action.clone()
            } else {
                RewriteAction::Continue(chunk)
            }
        }

        fn priority(&self) -> i32 {
            10
        }
    }

    async fn rewrite(chain: &RewriterChain, url: &str, chunks: &[&'static str]) -> (MemorySink, StreamFilterStatus) {
        let registry = RequestRegistry::new();
        let sink = MemorySink::new();
        let details = RequestDetails::new("r1", url, "GET", ResourceType::Script);
        let body = registry.begin(details, sink.clone()).unwrap();
        let (filter, events) = registry.filter_response_data(&"r1".into(), "test").unwrap();

        body.start().unwrap();
        for chunk in chunks {
            body.data(*chunk).unwrap();
        }
        body.finish().unwrap();

        let status = chain.run(&filter, events).await.unwrap();
        (sink, status)
    }

    #[tokio::test]
    async fn test_regex_across_chunks() {
        let mut chain = RewriterChain::new();
        chain.add(RegexReplace::new("secret", "[redacted]").unwrap());

        let (sink, status) = rewrite(&chain, "https://a.example/app.js", &["a sec", "ret b"]).await;
        assert_eq!(status, StreamFilterStatus::Closed);
        assert_eq!(&sink.contents()[..], b"a [redacted] b");
    }

    #[tokio::test]
    async fn test_regex_groups() {
        let mut chain = RewriterChain::new();
        chain.add(RegexReplace::new(r"(\w+)@example\.com", "$1@invalid").unwrap());

        let (sink, _) = rewrite(&chain, "https://a.example/", &["mail bob@example.com"]).await;
        assert_eq!(&sink.contents()[..], b"mail bob@invalid");
    }

    #[tokio::test]
    async fn test_regex_overflow_passes_through() {
        let mut chain = RewriterChain::new();
        chain.add(RegexReplace::new("a", "b").unwrap().max_buffer(4));

        let (sink, _) = rewrite(&chain, "https://a.example/", &["aaa", "aaa", "aa"]).await;
        assert_eq!(&sink.contents()[..], b"aaaaaaaa");
    }

    #[tokio::test]
    async fn test_regex_only_matching_requests() {
        let mut chain = RewriterChain::new();
        chain.add(
            RegexReplace::new("x", "y")
                .unwrap()
                .only(RequestFilter::new(["https://a.example/other.js"])),
        );

        let (sink, status) = rewrite(&chain, "https://a.example/app.js", &["xx"]).await;
        assert_eq!(status, StreamFilterStatus::Disconnected);
        assert_eq!(&sink.contents()[..], b"xx");
    }

    #[tokio::test]
    async fn test_disconnect_releases_buffered_body() {
        let registry = RequestRegistry::new();
        let sink = MemorySink::new();
        let details = RequestDetails::new("r1", "https://a.example/app.js", "GET", ResourceType::Script);
        let body = registry.begin(details, sink.clone()).unwrap();
        let (filter, events) = registry.filter_response_data(&"r1".into(), "test").unwrap();

        let regex = Arc::new(RegexReplace::new("zzz", "y").unwrap());
        let mut chain = RewriterChain::new();
        chain.add(EndOn {
            marker: "STOP",
            action: RewriteAction::Disconnect,
        });
        chain.add_shared(regex.clone());

        body.start().unwrap();
        body.data("hello ").unwrap();
        body.data("STOP").unwrap();
        let status = chain.run(&filter, events).await.unwrap();
        assert_eq!(status, StreamFilterStatus::Disconnected);

        body.data(" tail").unwrap();
        body.finish().unwrap();

        assert_eq!(&sink.contents()[..], b"hello  tail");
        assert!(sink.is_closed());
        assert!(regex.buffers.is_empty());
    }

    #[tokio::test]
    async fn test_close_finishes_buffered_body() {
        let regex = Arc::new(RegexReplace::new("a", "b").unwrap());
        let mut chain = RewriterChain::new();
        chain.add(EndOn {
            marker: "END",
            action: RewriteAction::Close,
        });
        chain.add_shared(regex.clone());

        let (sink, status) = rewrite(&chain, "https://a.example/", &["aa", "END", "aa"]).await;
        assert_eq!(status, StreamFilterStatus::Closed);
        assert_eq!(&sink.contents()[..], b"bb");
        assert!(sink.is_closed());
        assert!(regex.buffers.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(RegexReplace::new("(", "x").is_err());
    }

    #[tokio::test]
    async fn test_capture_truncates() {
        let capture = Arc::new(BodyCapture::new(5));
        let mut chain = RewriterChain::new();
        chain.add_shared(capture.clone());

        let (sink, _) = rewrite(&chain, "https://a.example/", &["hello", " world"]).await;
        assert_eq!(&sink.contents()[..], b"hello world");

        let captured = capture.captured(&"r1".into()).unwrap();
        assert_eq!(captured.text_lossy(), "hello");
        assert!(captured.truncated);
        assert!(captured.complete);
        assert_eq!(captured.url, "https://a.example/");
    }

    #[tokio::test]
    async fn test_capture_sees_rewritten_output() {
        let capture = Arc::new(BodyCapture::default());
        let mut chain = RewriterChain::new();
        chain.add(RegexReplace::new("old", "new").unwrap());
        chain.add_shared(capture.clone());

        rewrite(&chain, "https://a.example/", &["old text"]).await;
        assert_eq!(capture.captured(&"r1".into()).unwrap().text_lossy(), "new text");
    }

    #[tokio::test]
    async fn test_logger_passes_through() {
        let mut chain = RewriterChain::new();
        chain.add(BodyLogger::new().log_chunks(true));

        let (sink, _) = rewrite(&chain, "https://a.example/", &["a", "b"]).await;
        assert_eq!(&sink.contents()[..], b"ab");
    }

    #[test]
    fn test_logger_url_filter() {
        let logger = BodyLogger::new().url_filter("/api/");
        let api = RequestDetails::new("1", "https://a.example/api/x", "GET", ResourceType::XmlHttpRequest);
        let page = RequestDetails::new("2", "https://a.example/", "GET", ResourceType::MainFrame);

        assert!(logger.should_rewrite(&api));
        assert!(!logger.should_rewrite(&page));
    }
}
