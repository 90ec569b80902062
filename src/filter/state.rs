// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Shared per-request channel state
//!
//! Transport signals and consumer calls meet here, under one lock, so a
//! reader of the filter status never sees a half-applied transition.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use super::config::FilterConfig;
use super::event::{FilterEvent, FilterEvents};
use super::metrics::FilterMetrics;
use super::status::StreamFilterStatus;
use crate::error::{Error, Result};
use crate::network::{RequestDetails, RequestId};
use crate::transport::{Delivery, ResponseSink};

pub(crate) type SharedChannel = Arc<Mutex<ChannelState>>;

/// Progress of the underlying transfer, independent of any filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransportPhase {
    Pending,
    Streaming,
    Finished,
    Failed,
}

/// Transport signal that arrived while the filter was suspended
#[derive(Debug)]
enum Held {
    Data(Bytes),
    Stop,
}

/// State of the filter session bound to the request
struct FilterSlot {
    owner_id: String,
    status: StreamFilterStatus,
    error: Option<String>,
    /// Consumer output not yet forwarded
    pending: VecDeque<Bytes>,
    pending_bytes: usize,
    /// Transport input not yet delivered
    held: VecDeque<Held>,
    held_bytes: usize,
    events: Option<mpsc::UnboundedSender<FilterEvent>>,
    status_tx: watch::Sender<StreamFilterStatus>,
    created_at: Instant,
}

pub(crate) struct ChannelState {
    details: RequestDetails,
    phase: TransportPhase,
    sink: Box<dyn ResponseSink>,
    sink_closed: bool,
    filter: Option<FilterSlot>,
    config: FilterConfig,
    metrics: Arc<FilterMetrics>,
}

impl ChannelState {
    pub(crate) fn new(
        details: RequestDetails,
        sink: Box<dyn ResponseSink>,
        config: FilterConfig,
        metrics: Arc<FilterMetrics>,
    ) -> Self {
        Self {
            details,
            phase: TransportPhase::Pending,
            sink,
            sink_closed: false,
            filter: None,
            config,
            metrics,
        }
    }

    pub(crate) fn shared(self) -> SharedChannel {
        Arc::new(Mutex::new(self))
    }

    pub(crate) fn request_id(&self) -> &RequestId {
        &self.details.request_id
    }

    pub(crate) fn details(&self) -> &RequestDetails {
        &self.details
    }

    pub(crate) fn phase(&self) -> TransportPhase {
        self.phase
    }

    pub(crate) fn filter_status(&self) -> Option<StreamFilterStatus> {
        self.filter.as_ref().map(|f| f.status)
    }

    pub(crate) fn filter_error(&self) -> Option<String> {
        self.filter.as_ref().and_then(|f| f.error.clone())
    }

    pub(crate) fn pending_bytes(&self) -> usize {
        self.filter.as_ref().map(|f| f.pending_bytes).unwrap_or(0)
    }

    pub(crate) fn held_bytes(&self) -> usize {
        self.filter.as_ref().map(|f| f.held_bytes).unwrap_or(0)
    }

    pub(crate) fn status_receiver(&self) -> Option<watch::Receiver<StreamFilterStatus>> {
        self.filter.as_ref().map(|f| f.status_tx.subscribe())
    }

    /// Bind a new filter session to this request
    pub(crate) fn attach(&mut self, owner_id: &str) -> Result<FilterEvents> {
        let request_id = self.request_id().clone();

        if let Some(existing) = &self.filter {
            if existing.status.is_terminal() {
                return Err(Error::not_eligible(
                    request_id,
                    format!("already filtered by {} ({})", existing.owner_id, existing.status),
                ));
            }
            return Err(Error::SessionClaimConflict {
                request_id,
                owner_id: existing.owner_id.clone(),
            });
        }

        if self.phase != TransportPhase::Pending {
            return Err(Error::not_eligible(request_id, "response body already started"));
        }

        let (tx, events) = FilterEvents::channel();
        let (status_tx, _) = watch::channel(StreamFilterStatus::Uninitialized);

        self.filter = Some(FilterSlot {
            owner_id: owner_id.to_string(),
            status: StreamFilterStatus::Uninitialized,
            error: None,
            pending: VecDeque::new(),
            pending_bytes: 0,
            held: VecDeque::new(),
            held_bytes: 0,
            events: Some(tx),
            status_tx,
            created_at: Instant::now(),
        });
        self.metrics.record_session_created();

        tracing::debug!(request_id = %self.details.request_id, owner_id, "Stream filter attached");
        Ok(events)
    }

    // Transport side

    pub(crate) fn on_start(&mut self) -> Result<Delivery> {
        if self.phase != TransportPhase::Pending {
            return Err(self.out_of_order("start"));
        }
        self.phase = TransportPhase::Streaming;

        match self.filter_status() {
            Some(StreamFilterStatus::Uninitialized) => {
                self.transition(StreamFilterStatus::TransferringData);
                self.dispatch(FilterEvent::Start);
                Ok(Delivery::Dispatched)
            }
            None | Some(StreamFilterStatus::Disconnected) => Ok(Delivery::PassedThrough),
            Some(_) => Ok(Delivery::Discarded),
        }
    }

    pub(crate) fn on_data(&mut self, chunk: Bytes) -> Result<Delivery> {
        if self.phase != TransportPhase::Streaming {
            return Err(self.out_of_order("data"));
        }

        match self.filter_status() {
            None | Some(StreamFilterStatus::Disconnected) => {
                self.write_sink(&chunk)?;
                self.metrics.record_passed_through(chunk.len());
                Ok(Delivery::PassedThrough)
            }
            Some(StreamFilterStatus::TransferringData) => {
                self.metrics.record_delivery(chunk.len());
                self.dispatch(FilterEvent::Data(chunk));
                Ok(Delivery::Dispatched)
            }
            Some(StreamFilterStatus::Suspended) => self.hold(Held::Data(chunk)),
            Some(_) => Ok(Delivery::Discarded),
        }
    }

    pub(crate) fn on_finish(&mut self) -> Result<Delivery> {
        if self.phase != TransportPhase::Streaming {
            return Err(self.out_of_order("end of data"));
        }
        self.phase = TransportPhase::Finished;

        match self.filter_status() {
            None => {
                if self.config.close_unfiltered_sinks {
                    self.close_sink()?;
                }
                Ok(Delivery::PassedThrough)
            }
            Some(StreamFilterStatus::Disconnected) => {
                self.close_sink()?;
                Ok(Delivery::PassedThrough)
            }
            Some(StreamFilterStatus::TransferringData) => {
                self.transition(StreamFilterStatus::FinishedTransferringData);
                self.dispatch(FilterEvent::Stop);
                Ok(Delivery::Dispatched)
            }
            Some(StreamFilterStatus::Suspended) => self.hold(Held::Stop),
            Some(_) => Ok(Delivery::Discarded),
        }
    }

    pub(crate) fn on_error(&mut self, message: String) -> Result<Delivery> {
        if matches!(self.phase, TransportPhase::Finished | TransportPhase::Failed) {
            return Err(self.out_of_order("error"));
        }
        self.phase = TransportPhase::Failed;

        match self.filter_status() {
            Some(status) if !status.is_terminal() => {
                self.fail(message);
                Ok(Delivery::Dispatched)
            }
            status => {
                tracing::warn!(
                    request_id = %self.details.request_id,
                    error = %message,
                    "Transport failed without an active filter"
                );
                let passing_through = match status {
                    None => self.config.close_unfiltered_sinks,
                    Some(s) => s == StreamFilterStatus::Disconnected,
                };
                // Output ends here, same as end of data
                if passing_through {
                    if let Err(e) = self.close_sink() {
                        tracing::warn!(
                            request_id = %self.details.request_id,
                            error = %e,
                            "Closing output stream after transport failure failed"
                        );
                    }
                }
                Ok(Delivery::Discarded)
            }
        }
    }

    /// Transport handle went away before end of data
    pub(crate) fn on_abandoned(&mut self) {
        if matches!(self.phase, TransportPhase::Pending | TransportPhase::Streaming) {
            // Never errors from Pending or Streaming
            let _ = self.on_error("response body dropped before end of data".to_string());
        }
    }

    // Consumer side

    pub(crate) fn suspend(&mut self) -> Result<()> {
        let status = self.require_filter("suspend")?;
        if status != StreamFilterStatus::TransferringData {
            return Err(self.reject("suspend", status));
        }
        self.transition(StreamFilterStatus::Suspended);
        self.metrics.record_suspension();
        Ok(())
    }

    pub(crate) fn resume(&mut self) -> Result<()> {
        let status = self.require_filter("resume")?;
        if status != StreamFilterStatus::Suspended {
            return Err(self.reject("resume", status));
        }
        self.transition(StreamFilterStatus::TransferringData);

        if !self.flush_pending() {
            return Ok(());
        }

        let held = match self.filter.as_mut() {
            Some(slot) => {
                slot.held_bytes = 0;
                std::mem::take(&mut slot.held)
            }
            None => VecDeque::new(),
        };

        for signal in held {
            match signal {
                Held::Data(chunk) => {
                    self.metrics.record_delivery(chunk.len());
                    self.dispatch(FilterEvent::Data(chunk));
                }
                Held::Stop => {
                    self.transition(StreamFilterStatus::FinishedTransferringData);
                    self.dispatch(FilterEvent::Stop);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn write(&mut self, chunk: Bytes) -> Result<()> {
        let status = self.require_filter("write")?;
        if !status.accepts_writes() {
            self.metrics.record_rejected_call();
            return Err(Error::write_rejected(status));
        }

        if status.queues_writes() {
            let limit = self.config.max_pending_bytes;
            let Some(slot) = self.filter.as_mut() else {
                return Err(Error::write_rejected(status));
            };
            if slot.pending_bytes + chunk.len() > limit {
                self.metrics.record_rejected_call();
                return Err(Error::OutputBufferFull {
                    pending: slot.pending_bytes,
                    limit,
                });
            }
            slot.pending_bytes += chunk.len();
            slot.pending.push_back(chunk);
            return Ok(());
        }

        if self.flush_pending() {
            self.forward(chunk);
        }
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        let status = self.require_filter("close")?;
        if status.is_terminal() {
            return Err(self.reject("close", status));
        }

        if !self.flush_pending() {
            return Ok(());
        }
        if let Err(e) = self.close_sink() {
            self.fail(format!("closing output stream failed: {}", e));
            return Ok(());
        }
        if let Some(slot) = self.filter.as_mut() {
            slot.held.clear();
            slot.held_bytes = 0;
        }
        self.transition(StreamFilterStatus::Closed);
        Ok(())
    }

    pub(crate) fn disconnect(&mut self) -> Result<()> {
        let status = self.require_filter("disconnect")?;
        if status.is_terminal() {
            return Err(self.reject("disconnect", status));
        }

        if !self.flush_pending() {
            return Ok(());
        }

        let held = match self.filter.as_mut() {
            Some(slot) => {
                slot.held_bytes = 0;
                std::mem::take(&mut slot.held)
            }
            None => VecDeque::new(),
        };
        for signal in held {
            if let Held::Data(chunk) = signal {
                if let Err(e) = self.write_sink(&chunk) {
                    self.fail(format!("output stream write failed: {}", e));
                    return Ok(());
                }
                self.metrics.record_passed_through(chunk.len());
            }
        }

        self.transition(StreamFilterStatus::Disconnected);

        // No further end-of-data signal will arrive to close the sink
        if self.phase == TransportPhase::Finished {
            if let Err(e) = self.close_sink() {
                tracing::warn!(
                    request_id = %self.details.request_id,
                    error = %e,
                    "Closing output stream after disconnect failed"
                );
            }
        }
        Ok(())
    }

    // Internals

    fn require_filter(&self, operation: &'static str) -> Result<StreamFilterStatus> {
        self.filter_status()
            .ok_or_else(|| Error::other(format!("No stream filter attached, cannot {}", operation)))
    }

    fn reject(&self, operation: &'static str, status: StreamFilterStatus) -> Error {
        self.metrics.record_rejected_call();
        tracing::debug!(
            request_id = %self.details.request_id,
            operation,
            %status,
            "Rejected stream filter call"
        );
        Error::invalid_transition(operation, status)
    }

    fn out_of_order(&self, signal: &str) -> Error {
        Error::transport(format!(
            "transport signalled {} for request {} while {:?}",
            signal, self.details.request_id, self.phase
        ))
    }

    fn transition(&mut self, to: StreamFilterStatus) {
        let Some(slot) = self.filter.as_mut() else {
            return;
        };
        let from = slot.status;
        slot.status = to;
        slot.status_tx.send_replace(to);

        if to.is_terminal() {
            // Ends the consumer's event stream
            slot.events = None;
            self.metrics
                .record_session_ended(to, slot.created_at.elapsed().as_millis() as u64);
        }

        tracing::debug!(
            request_id = %self.details.request_id,
            owner_id = %slot.owner_id,
            %from,
            %to,
            "Stream filter transition"
        );
    }

    fn dispatch(&self, event: FilterEvent) {
        if let Some(tx) = self.filter.as_ref().and_then(|f| f.events.as_ref()) {
            if tx.send(event).is_err() {
                tracing::trace!(request_id = %self.details.request_id, "Filter events receiver dropped");
            }
        }
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(
            request_id = %self.details.request_id,
            error = %message,
            "Stream filter failed"
        );
        if let Some(slot) = self.filter.as_mut() {
            slot.error = Some(message.clone());
            slot.pending.clear();
            slot.pending_bytes = 0;
            slot.held.clear();
            slot.held_bytes = 0;
        }
        self.dispatch(FilterEvent::Error(message));
        self.transition(StreamFilterStatus::Failed);
    }

    fn hold(&mut self, signal: Held) -> Result<Delivery> {
        let limit = self.config.max_held_bytes;
        let Some(slot) = self.filter.as_mut() else {
            return Ok(Delivery::Discarded);
        };

        if let Held::Data(chunk) = &signal {
            slot.held_bytes += chunk.len();
        }
        slot.held.push_back(signal);
        let buffered = slot.held_bytes;

        if buffered > limit {
            self.fail(format!("suspended input buffer exceeded {} bytes", limit));
            return Ok(Delivery::Discarded);
        }
        Ok(Delivery::Held { buffered })
    }

    /// Forward queued output; false if the session failed doing so
    fn flush_pending(&mut self) -> bool {
        let pending = match self.filter.as_mut() {
            Some(slot) => {
                slot.pending_bytes = 0;
                std::mem::take(&mut slot.pending)
            }
            None => return true,
        };

        for chunk in pending {
            if !self.forward(chunk) {
                return false;
            }
        }
        true
    }

    fn forward(&mut self, chunk: Bytes) -> bool {
        match self.write_sink(&chunk) {
            Ok(()) => {
                self.metrics.record_written(chunk.len());
                true
            }
            Err(e) => {
                self.fail(format!("output stream write failed: {}", e));
                false
            }
        }
    }

    fn write_sink(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.sink_closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "output stream closed"));
        }
        self.sink.write(chunk)
    }

    fn close_sink(&mut self) -> io::Result<()> {
        if self.sink_closed {
            return Ok(());
        }
        self.sink_closed = true;
        self.sink.close()
    }
}
