// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! In-flight request tracking and request metadata
//!
//! Describes the requests a transport is serving and hands out stream
//! filters for their response bodies.

mod blocking;
mod event;
mod filter;
mod registry;

pub use blocking::{AuthCredentials, BlockingResponse};
pub use event::{
    ExtraInfoSpec, HttpHeader, RequestBody, RequestDetails, RequestId, RequestStage,
    ResourceType, UploadData,
};
pub use filter::{RequestFilter, ALL_URLS};
pub use registry::RequestRegistry;
