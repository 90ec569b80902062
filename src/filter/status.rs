// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Stream filter lifecycle status

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Lifecycle status of a stream filter session
///
/// `Closed`, `Disconnected` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFilterStatus {
    /// Bound to a request, transport has not started yet
    Uninitialized,
    /// Transport is delivering data
    TransferringData,
    /// Transport delivered all data; writes still accepted
    FinishedTransferringData,
    /// Delivery paused by the consumer; writes still accepted
    Suspended,
    /// Consumer closed the session
    Closed,
    /// Filter detached; remaining data bypasses it
    Disconnected,
    /// Transport or internal error
    Failed,
}

impl StreamFilterStatus {
    /// All statuses, in declaration order
    pub const ALL: [StreamFilterStatus; 7] = [
        StreamFilterStatus::Uninitialized,
        StreamFilterStatus::TransferringData,
        StreamFilterStatus::FinishedTransferringData,
        StreamFilterStatus::Suspended,
        StreamFilterStatus::Closed,
        StreamFilterStatus::Disconnected,
        StreamFilterStatus::Failed,
    ];

    /// Check if no further transitions are defined
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamFilterStatus::Closed
                | StreamFilterStatus::Disconnected
                | StreamFilterStatus::Failed
        )
    }

    /// Check if write() is accepted in this status
    pub fn accepts_writes(self) -> bool {
        matches!(
            self,
            StreamFilterStatus::TransferringData
                | StreamFilterStatus::FinishedTransferringData
                | StreamFilterStatus::Suspended
        )
    }

    /// Check if written data is queued instead of forwarded right away
    pub fn queues_writes(self) -> bool {
        matches!(
            self,
            StreamFilterStatus::FinishedTransferringData | StreamFilterStatus::Suspended
        )
    }

    /// Status name as exposed to consumers
    pub fn as_str(self) -> &'static str {
        match self {
            StreamFilterStatus::Uninitialized => "uninitialized",
            StreamFilterStatus::TransferringData => "transferringdata",
            StreamFilterStatus::FinishedTransferringData => "finishedtransferringdata",
            StreamFilterStatus::Suspended => "suspended",
            StreamFilterStatus::Closed => "closed",
            StreamFilterStatus::Disconnected => "disconnected",
            StreamFilterStatus::Failed => "failed",
        }
    }
}

impl Default for StreamFilterStatus {
    fn default() -> Self {
        StreamFilterStatus::Uninitialized
    }
}

impl fmt::Display for StreamFilterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamFilterStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamFilterStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::other(format!("Unknown stream filter status: {}", s)))
    }
}
