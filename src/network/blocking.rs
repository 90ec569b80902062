// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Blocking decisions returned by request observers
//!
//! An observer subscribed with the `blocking` option answers each event
//! with one [`BlockingResponse`]. Only one outcome takes effect per event.

use serde::{Deserialize, Serialize};

use super::event::{HttpHeader, RequestStage};

/// Credentials supplied for an authentication challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCredentials {
    pub username: String,
    pub password: String,
}

impl AuthCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Authorization` header value for the Basic scheme
    pub fn basic_header(&self) -> String {
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            format!("{}:{}", self.username, self.password),
        );
        format!("Basic {}", encoded)
    }
}

/// Decision of a blocking observer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum BlockingResponse {
    /// Let the request continue unchanged
    Allow,
    /// Cancel the request
    Cancel,
    /// Redirect to another URL, any scheme
    Redirect(String),
    /// Retry over a secure scheme
    UpgradeToSecure,
    /// Send these request headers instead
    ModifyRequestHeaders(Vec<HttpHeader>),
    /// Treat the response as carrying these headers
    ModifyResponseHeaders(Vec<HttpHeader>),
    /// Answer an authentication challenge
    SupplyCredentials(AuthCredentials),
}

impl BlockingResponse {
    /// Check if the decision has any effect at the given stage
    pub fn permitted_at(&self, stage: RequestStage) -> bool {
        match self {
            BlockingResponse::Allow => true,
            BlockingResponse::Cancel => stage.can_block(),
            BlockingResponse::Redirect(_) => matches!(
                stage,
                RequestStage::BeforeRequest | RequestStage::HeadersReceived
            ),
            BlockingResponse::UpgradeToSecure => stage == RequestStage::BeforeRequest,
            BlockingResponse::ModifyRequestHeaders(_) => stage == RequestStage::BeforeSendHeaders,
            BlockingResponse::ModifyResponseHeaders(_) => stage == RequestStage::HeadersReceived,
            BlockingResponse::SupplyCredentials(_) => stage == RequestStage::AuthRequired,
        }
    }

    /// Pick the single decision that takes effect at a stage
    ///
    /// Decisions not permitted at the stage are ignored. Cancel wins over
    /// a redirect, a redirect wins over an upgrade, and among header or
    /// credential modifications the first one wins.
    pub fn effective<I>(stage: RequestStage, decisions: I) -> BlockingResponse
    where
        I: IntoIterator<Item = BlockingResponse>,
    {
        decisions
            .into_iter()
            .filter(|d| d.permitted_at(stage))
            .fold(BlockingResponse::Allow, |current, next| {
                if next.rank() > current.rank() {
                    next
                } else {
                    current
                }
            })
    }

    /// Method used for the redirected request
    ///
    /// Redirects issued once response headers arrived always use GET.
    pub fn redirect_method<'a>(stage: RequestStage, original: &'a str) -> &'a str {
        if stage == RequestStage::HeadersReceived {
            "GET"
        } else {
            original
        }
    }

    /// Check if the request goes ahead unchanged
    pub fn is_allow(&self) -> bool {
        matches!(self, BlockingResponse::Allow)
    }

    fn rank(&self) -> u8 {
        match self {
            BlockingResponse::Allow => 0,
            BlockingResponse::ModifyRequestHeaders(_)
            | BlockingResponse::ModifyResponseHeaders(_)
            | BlockingResponse::SupplyCredentials(_) => 1,
            BlockingResponse::UpgradeToSecure => 2,
            BlockingResponse::Redirect(_) => 3,
            BlockingResponse::Cancel => 4,
        }
    }
}

impl Default for BlockingResponse {
    fn default() -> Self {
        BlockingResponse::Allow
    }
}
