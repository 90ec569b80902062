// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Transport side of response filtering
//!
//! The network layer feeds bodies through [`ResponseBody`]; output lands in
//! a [`ResponseSink`].

mod body;
mod http;
mod sink;

pub use body::{Delivery, ResponseBody};
pub use http::{FetchOutcome, HttpTransport, HttpTransportConfig, PendingFetch};
pub use sink::{ChannelSink, MemorySink, ResponseSink, SinkChunk, WriterSink};
