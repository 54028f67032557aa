//! Production state types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A target wallet platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    AppleWallet,
    GoogleWallet,
}

impl Channel {
    /// Value stored in `ticket_passes.channel`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::AppleWallet => "apple_wallet",
            Channel::GoogleWallet => "google_wallet",
        }
    }

    /// Platform tag used to namespace stored artifacts.
    pub fn platform(&self) -> &'static str {
        match self {
            Channel::AppleWallet => "apple",
            Channel::GoogleWallet => "google",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "apple_wallet" => Ok(Channel::AppleWallet),
            "google_wallet" => Ok(Channel::GoogleWallet),
            other => Err(StoreError::InvalidInput(format!("unknown channel: {}", other))),
        }
    }
}

/// Lifecycle of a pass on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Pending,
    Produced,
    Sent,
    Failed,
}

impl PassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassStatus::Pending => "pending",
            PassStatus::Produced => "produced",
            PassStatus::Sent => "sent",
            PassStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PassStatus::Pending),
            "produced" => Some(PassStatus::Produced),
            "sent" => Some(PassStatus::Sent),
            "failed" => Some(PassStatus::Failed),
            _ => None,
        }
    }

    /// Whether a pass in this state counts as already produced.
    pub fn is_available(&self) -> bool {
        matches!(self, PassStatus::Produced | PassStatus::Sent)
    }
}

/// Persisted state of one ticket on one channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassRecord {
    pub id: String,
    /// Internal ticket row ID.
    pub ticket_id: String,
    /// External (Ticket Tailor) ticket ID.
    pub ticket_tailor_id: String,
    pub purchaser_email: String,
    pub channel: Channel,
    pub status: PassStatus,
    pub produced_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pass counts per status for a channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub produced: u64,
    pub sent: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.produced + self.sent + self.failed
    }
}

/// Errors from the production state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no {channel} pass for ticket {ticket_id}")]
    NotFound { channel: Channel, ticket_id: String },

    /// Another writer held the lock past the busy timeout.
    #[error("database busy: {0}")]
    Busy(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Busy(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

/// Persistence of per-channel production state.
///
/// Implementations must make `mark_produced` atomic and serialize concurrent
/// writers touching the same ticket.
pub trait ProductionStore: Send + Sync {
    /// Passes on `channel` whose status is Produced or Sent, keyed by external ticket ID.
    fn list_produced(&self, channel: Channel) -> Result<HashMap<String, PassRecord>, StoreError>;

    /// Idempotently record that a pass was produced.
    ///
    /// Creates the ticket on first sight and updates its email when it changed.
    fn mark_produced(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
        purchaser_email: &str,
        produced_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Merge delivery metadata into a pass. A `delivered_at` moves it to Sent.
    fn record_delivery(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
        delivered_at: Option<DateTime<Utc>>,
        metadata: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Move a pass to Failed with the given message.
    fn mark_failed(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Get one pass record.
    fn get_pass(
        &self,
        channel: Channel,
        ticket_tailor_id: &str,
    ) -> Result<Option<PassRecord>, StoreError>;

    /// Count passes on `channel` by status.
    fn count_by_status(&self, channel: Channel) -> Result<StatusCounts, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_round_trip() {
        for channel in [Channel::AppleWallet, Channel::GoogleWallet] {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
        assert!("samsung_wallet".parse::<Channel>().is_err());
        assert_eq!(Channel::GoogleWallet.platform(), "google");
    }

    #[test]
    fn test_status_availability() {
        assert!(PassStatus::Produced.is_available());
        assert!(PassStatus::Sent.is_available());
        assert!(!PassStatus::Pending.is_available());
        assert!(!PassStatus::Failed.is_available());
        assert_eq!(PassStatus::parse("sent"), Some(PassStatus::Sent));
        assert_eq!(PassStatus::parse("SENT"), None);
    }
}
