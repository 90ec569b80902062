// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Siivila - Response Body Stream Filtering
//!
//! Intercept the body of an in-flight HTTP response as it arrives, pause
//! the transfer, rewrite or pass data through, then close or step aside
//! while the transfer carries on.
//!
//! ## Features
//!
//! - Stream filters: one interception session per response, with a strict
//!   status machine (uninitialized, transferringdata, suspended, ...)
//! - Backpressure: suspend() holds the transport, resume() picks up where
//!   it paused, nothing delivered twice
//! - Disconnect: hand the rest of a body back to the transport unmodified
//! - Bounded buffers for queued output and held input
//! - Request registry: in-flight requests, request filters, metadata
//! - Body rewriters: priority-ordered middleware, regex replacement,
//!   capture and logging
//! - HTTP transport: streams real responses, honors suspension
//!
//! ## Example
//!
//! ```rust,no_run
//! use siivila::{FilterEvent, MemorySink, RequestDetails, RequestRegistry, ResourceType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = RequestRegistry::new();
//!     let sink = MemorySink::new();
//!
//!     let details = RequestDetails::new("1", "https://example.com/", "GET", ResourceType::MainFrame);
//!     let body = registry.begin(details, sink.clone())?;
//!     let (filter, mut events) = registry.filter_response_data(&"1".into(), "my-observer")?;
//!
//!     body.start()?;
//!     body.data("hello")?;
//!     body.finish()?;
//!
//!     while let Some(event) = events.next_event().await {
//!         match event {
//!             FilterEvent::Data(chunk) => filter.write(chunk.to_ascii_uppercase())?,
//!             FilterEvent::Stop => filter.close()?,
//!             _ => {}
//!         }
//!     }
//!
//!     assert_eq!(&sink.contents()[..], b"HELLO");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod filter;
pub mod network;
pub mod rewrite;
pub mod transport;

// Re-exports for convenience

// Errors
pub use error::{Error, ErrorContext, Result};

// Stream filters
pub use filter::{
    FilterConfig, FilterEvent, FilterEvents, FilterMetrics, MetricsReport, StreamFilter,
    StreamFilterStatus,
};

// Requests
pub use network::{
    AuthCredentials, BlockingResponse, ExtraInfoSpec, HttpHeader, RequestBody, RequestDetails,
    RequestFilter, RequestId, RequestRegistry, RequestStage, ResourceType, UploadData, ALL_URLS,
};

// Rewriters
pub use rewrite::{
    BodyCapture, BodyLogger, BodyRewriter, CapturedBody, RegexReplace, RewriteAction,
    RewriterChain,
};

// Transport
pub use transport::{
    ChannelSink, Delivery, FetchOutcome, HttpTransport, HttpTransportConfig, MemorySink,
    PendingFetch, ResponseBody, ResponseSink, SinkChunk, WriterSink,
};

/// Siivila version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
