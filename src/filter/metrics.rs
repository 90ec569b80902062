// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Filter metrics
//!
//! Counts sessions, chunks and bytes across every request of a registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::status::StreamFilterStatus;

/// Filter metrics collector
#[derive(Debug, Default)]
pub struct FilterMetrics {
    /// Requests registered with the transport
    requests_started: AtomicU64,
    /// Filter sessions created
    sessions_created: AtomicU64,
    /// Sessions ended by close()
    sessions_closed: AtomicU64,
    /// Sessions ended by disconnect()
    sessions_disconnected: AtomicU64,
    /// Sessions ended by a failure
    sessions_failed: AtomicU64,
    /// Chunks dispatched to consumers
    chunks_delivered: AtomicU64,
    /// Bytes dispatched to consumers
    bytes_delivered: AtomicU64,
    /// Bytes consumers forwarded downstream
    bytes_written: AtomicU64,
    /// Bytes that reached a sink without passing through a filter
    bytes_passed_through: AtomicU64,
    /// suspend() calls accepted
    suspensions: AtomicU64,
    /// Calls rejected for the current status
    rejected_calls: AtomicU64,
    /// Start time for uptime calculation
    start_time: RwLock<Option<Instant>>,
    /// Session lifetimes for percentile calculation
    session_lifetimes: RwLock<Vec<u64>>,
}

/// Metrics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Uptime in seconds
    pub uptime_secs: u64,
    pub requests_started: u64,
    pub sessions_created: u64,
    pub sessions_closed: u64,
    pub sessions_disconnected: u64,
    pub sessions_failed: u64,
    /// Sessions not yet in a terminal status
    pub active_sessions: u64,
    pub chunks_delivered: u64,
    pub bytes_delivered: u64,
    pub bytes_written: u64,
    pub bytes_passed_through: u64,
    pub suspensions: u64,
    pub rejected_calls: u64,
    /// Session lifetime percentiles
    pub lifetime_p50_ms: u64,
    pub lifetime_p95_ms: u64,
    pub lifetime_p99_ms: u64,
}

impl FilterMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        let metrics = Self::default();
        *metrics.start_time.write() = Some(Instant::now());
        metrics
    }

    pub(crate) fn record_request_started(&self) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self, bytes: usize) {
        self.chunks_delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_passed_through(&self, bytes: usize) {
        self.bytes_passed_through.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_suspension(&self) {
        self.suspensions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_call(&self) {
        self.rejected_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session reaching a terminal status
    pub(crate) fn record_session_ended(&self, status: StreamFilterStatus, lifetime_ms: u64) {
        let counter = match status {
            StreamFilterStatus::Closed => &self.sessions_closed,
            StreamFilterStatus::Disconnected => &self.sessions_disconnected,
            StreamFilterStatus::Failed => &self.sessions_failed,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let mut lifetimes = self.session_lifetimes.write();
        lifetimes.push(lifetime_ms);

        // Keep only last 10000 lifetimes
        if lifetimes.len() > 10000 {
            lifetimes.drain(0..5000);
        }
    }

    /// Get current report
    pub fn report(&self) -> MetricsReport {
        let sessions_created = self.sessions_created.load(Ordering::Relaxed);
        let sessions_closed = self.sessions_closed.load(Ordering::Relaxed);
        let sessions_disconnected = self.sessions_disconnected.load(Ordering::Relaxed);
        let sessions_failed = self.sessions_failed.load(Ordering::Relaxed);

        let uptime_secs = self
            .start_time
            .read()
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0);

        let lifetimes = self.session_lifetimes.read();
        let (p50, p95, p99) = calculate_percentiles(&lifetimes);

        MetricsReport {
            uptime_secs,
            requests_started: self.requests_started.load(Ordering::Relaxed),
            sessions_created,
            sessions_closed,
            sessions_disconnected,
            sessions_failed,
            active_sessions: sessions_created
                .saturating_sub(sessions_closed + sessions_disconnected + sessions_failed),
            chunks_delivered: self.chunks_delivered.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_passed_through: self.bytes_passed_through.load(Ordering::Relaxed),
            suspensions: self.suspensions.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            lifetime_p50_ms: p50,
            lifetime_p95_ms: p95,
            lifetime_p99_ms: p99,
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        for counter in [
            &self.requests_started,
            &self.sessions_created,
            &self.sessions_closed,
            &self.sessions_disconnected,
            &self.sessions_failed,
            &self.chunks_delivered,
            &self.bytes_delivered,
            &self.bytes_written,
            &self.bytes_passed_through,
            &self.suspensions,
            &self.rejected_calls,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.start_time.write() = Some(Instant::now());
        self.session_lifetimes.write().clear();
    }
}

/// Calculate percentiles from lifetimes
fn calculate_percentiles(values: &[u64]) -> (u64, u64, u64) {
    if values.is_empty() {
        return (0, 0, 0);
    }

    let mut sorted: Vec<u64> = values.to_vec();
    sorted.sort_unstable();

    let len = sorted.len();
    let p50 = sorted[len / 2];
    let p95 = sorted[((len as f64 * 0.95) as usize).min(len - 1)];
    let p99 = sorted[((len as f64 * 0.99) as usize).min(len - 1)];

    (p50, p95, p99)
}
