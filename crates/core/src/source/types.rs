//! Types for the ticket source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An issued ticket as returned by the ticketing platform.
///
/// Treated as a read-only snapshot for the duration of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IssuedTicket {
    #[serde(default)]
    pub object: String,
    pub id: String,
    #[serde(default)]
    pub add_on_id: Option<String>,
    /// Payload encoded into the pass QR code.
    #[serde(default)]
    pub barcode: String,
    #[serde(default)]
    pub barcode_url: String,
    /// "true" / "false" as reported by the API.
    #[serde(default)]
    pub checked_in: String,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub custom_questions: Vec<serde_json::Value>,
    /// Human readable event description.
    #[serde(default)]
    pub description: String,
    /// Purchaser email.
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub event_series_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub group_ticket_barcode: Option<String>,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub listed_currency: ListedCurrency,
    #[serde(default)]
    pub listed_price: i64,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub qr_code_url: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub reservation: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ticket_type_id: String,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub voided_at: Option<String>,
}

impl IssuedTicket {
    /// Whether the platform reports this ticket as checked in.
    pub fn is_checked_in(&self) -> bool {
        self.checked_in.eq_ignore_ascii_case("true")
    }
}

/// Currency a ticket price is listed in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListedCurrency {
    #[serde(default)]
    pub base_multiplier: i64,
    #[serde(default)]
    pub code: String,
}

/// One page of the issued tickets listing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IssuedTicketPage {
    #[serde(default)]
    pub data: Vec<IssuedTicket>,
}

/// Check-in mutation direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckAction {
    CheckIn,
    CheckOut,
}

impl CheckAction {
    /// Signed quantity posted to the check-in endpoint.
    pub fn quantity(self) -> i32 {
        match self {
            CheckAction::CheckIn => 1,
            CheckAction::CheckOut => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckAction::CheckIn => "check_in",
            CheckAction::CheckOut => "check_out",
        }
    }
}

/// Response of the check-in mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckInResponse {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub check_in_at: i64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub event_series_id: String,
    #[serde(default)]
    pub issued_ticket_id: String,
    #[serde(default)]
    pub quantity: i32,
}

/// Errors from the ticket source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Missing or malformed credentials / URL. Raised before any network call.
    #[error("invalid ticket source configuration: {0}")]
    Configuration(String),

    #[error("ticket source request timed out")]
    Timeout,

    #[error("connection to ticket source failed: {0}")]
    ConnectionFailed(String),

    #[error("ticket source returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode ticket source response: {0}")]
    Decode(String),

    #[error("ticket source transport error: {0}")]
    Transport(String),
}

impl SourceError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if e.is_connect() {
            SourceError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

/// A platform that issues tickets for an event.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Name of this source implementation.
    fn name(&self) -> &str;

    /// Fetch one page of issued tickets, starting after the given ticket ID.
    async fn fetch_issued_tickets(
        &self,
        status: &str,
        starting_after: Option<&str>,
    ) -> Result<Vec<IssuedTicket>, SourceError>;

    /// Fetch every issued ticket by following the `starting_after` cursor
    /// until an empty page is returned.
    ///
    /// Any page failure fails the whole call; pages already collected are dropped.
    async fn fetch_all_issued_tickets(&self, status: &str) -> Result<Vec<IssuedTicket>, SourceError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.fetch_issued_tickets(status, cursor.as_deref()).await?;
            let Some(last) = page.last() else {
                break;
            };

            // A cursor that does not move would loop forever.
            if cursor.as_deref() == Some(last.id.as_str()) {
                return Err(SourceError::Decode(format!(
                    "pagination cursor did not advance past {}",
                    last.id
                )));
            }

            cursor = Some(last.id.clone());
            all.extend(page);
        }

        Ok(all)
    }

    /// Check a ticket in or out.
    async fn set_check_in(
        &self,
        ticket_id: &str,
        action: CheckAction,
    ) -> Result<CheckInResponse, SourceError>;
}
