// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP transport streaming responses through the registry

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use super::body::ResponseBody;
use super::sink::ResponseSink;
use crate::error::{Error, Result};
use crate::network::{HttpHeader, RequestDetails, RequestId, RequestRegistry, ResourceType};

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("Siivila/", env!("CARGO_PKG_VERSION"));

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// User agent string
    pub user_agent: String,
    /// Whole-request timeout
    pub timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Accept invalid certificates (dangerous!)
    pub accept_invalid_certs: bool,
    /// Proxy URL
    pub proxy: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            accept_invalid_certs: false,
            proxy: None,
        }
    }
}

impl HttpTransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }
}

/// Summary of a completed fetch
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub request_id: RequestId,
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub headers: Vec<HttpHeader>,
    /// Bytes read from the network, before any filtering
    pub bytes_received: u64,
}

/// HTTP transport feeding response bodies through a [`RequestRegistry`]
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
    registry: RequestRegistry,
}

impl HttpTransport {
    /// Create a transport with default configuration
    pub fn new(registry: RequestRegistry) -> Result<Self> {
        Self::with_config(registry, HttpTransportConfig::default())
    }

    /// Create a transport with custom configuration
    pub fn with_config(registry: RequestRegistry, config: HttpTransportConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(ref proxy_url) = config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?,
            );
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            config,
            registry,
        })
    }

    /// Registry the transport reports to
    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    /// Get configuration
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Register a GET request without sending it
    ///
    /// Observers may attach a filter to the returned request id before
    /// [`PendingFetch::send`] is called.
    pub fn prepare(
        &self,
        url: &str,
        resource_type: ResourceType,
        sink: impl ResponseSink + 'static,
    ) -> Result<PendingFetch> {
        let url = Url::parse(url)?;
        let request_id = self.registry.next_request_id();
        let details = RequestDetails::new(request_id, url.as_str(), "GET", resource_type);
        let body = self.registry.begin(details, sink)?;

        Ok(PendingFetch {
            client: self.client.clone(),
            url,
            body,
        })
    }

    /// Register and send a GET request
    pub async fn fetch(
        &self,
        url: &str,
        resource_type: ResourceType,
        sink: impl ResponseSink + 'static,
    ) -> Result<FetchOutcome> {
        self.prepare(url, resource_type, sink)?.send().await
    }
}

/// Registered request waiting to be sent
#[derive(Debug)]
pub struct PendingFetch {
    client: Client,
    url: Url,
    body: ResponseBody,
}

impl PendingFetch {
    /// Id assigned by the registry
    pub fn request_id(&self) -> &RequestId {
        self.body.request_id()
    }

    /// Send the request and stream the body
    ///
    /// Stops reading from the network while an attached filter is
    /// suspended.
    pub async fn send(self) -> Result<FetchOutcome> {
        let PendingFetch { client, url, body } = self;
        let request_id = body.request_id().clone();

        tracing::debug!(request_id = %request_id, url = %url, "Sending request");

        let mut response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                body.fail(e.to_string())?;
                return Err(e.into());
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers: Vec<HttpHeader> = response
            .headers()
            .iter()
            .map(|(name, value)| match value.to_str() {
                Ok(text) => HttpHeader::new(name.as_str(), text),
                Err(_) => HttpHeader::binary(name.as_str(), value.as_bytes().to_vec()),
            })
            .collect();

        body.start()?;

        let mut bytes_received = 0u64;
        loop {
            body.ready().await;
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    bytes_received += chunk.len() as u64;
                    body.data(chunk)?;
                }
                Ok(None) => break,
                Err(e) => {
                    body.fail(e.to_string())?;
                    return Err(e.into());
                }
            }
        }
        body.finish()?;

        tracing::debug!(request_id = %request_id, status, bytes_received, "Response complete");

        Ok(FetchOutcome {
            request_id,
            url: final_url,
            status,
            headers,
            bytes_received,
        })
    }
}
