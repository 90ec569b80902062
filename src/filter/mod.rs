// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response body stream filters
//!
//! A [`StreamFilter`] sits between the transport and the sink of one
//! response. It sees every chunk, decides what goes downstream, and can
//! pause the transfer or step aside at any time.

mod config;
mod event;
mod metrics;
pub(crate) mod state;
mod status;
mod stream_filter;

pub use config::FilterConfig;
pub use event::{FilterEvent, FilterEvents};
pub use metrics::{FilterMetrics, MetricsReport};
pub use status::StreamFilterStatus;
pub use stream_filter::StreamFilter;
