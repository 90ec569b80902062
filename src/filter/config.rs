// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Stream filter configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorContext, Result};

/// Buffer limits applied to every filter session of a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Max bytes written by the consumer and not yet forwarded downstream
    pub max_pending_bytes: usize,
    /// Max bytes the transport may push while the filter is suspended
    pub max_held_bytes: usize,
    /// Close the output sink when a request finishes without a filter
    pub close_unfiltered_sinks: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_pending_bytes: 4 * 1024 * 1024, // 4MB
            max_held_bytes: 8 * 1024 * 1024,    // 8MB
            close_unfiltered_sinks: true,
        }
    }
}

impl FilterConfig {
    /// Create a new filter config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pending output limit
    pub fn max_pending_bytes(mut self, limit: usize) -> Self {
        self.max_pending_bytes = limit;
        self
    }

    /// Set suspended input limit
    pub fn max_held_bytes(mut self, limit: usize) -> Self {
        self.max_held_bytes = limit;
        self
    }

    /// Close sinks of unfiltered requests at end of data
    pub fn close_unfiltered_sinks(mut self, close: bool) -> Self {
        self.close_unfiltered_sinks = close;
        self
    }

    /// Config for consumers that buffer whole bodies before rewriting
    pub fn for_rewriting() -> Self {
        Self {
            max_pending_bytes: 32 * 1024 * 1024,
            max_held_bytes: 32 * 1024 * 1024,
            ..Default::default()
        }
    }

    /// Config for consumers that forward chunk by chunk
    pub fn for_streaming() -> Self {
        Self {
            max_pending_bytes: 256 * 1024,
            max_held_bytes: 1024 * 1024,
            ..Default::default()
        }
    }

    /// Parse a JSON config, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: FilterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).context("reading filter config")?;
        Self::from_json(&content)
    }

    /// Reject limits that would make every session fail
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_bytes == 0 {
            return Err(Error::config("max_pending_bytes must be greater than zero"));
        }
        if self.max_held_bytes == 0 {
            return Err(Error::config("max_held_bytes must be greater than zero"));
        }
        Ok(())
    }
}
