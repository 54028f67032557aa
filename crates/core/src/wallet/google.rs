//! Google Wallet event ticket objects.
//!
//! Produces the JSON document that is later submitted to the Google Wallet
//! API. Output is deterministic for a given ticket and clock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::GoogleWalletConfig;
use crate::source::IssuedTicket;
use crate::store::Channel;

use super::apple::resolve_holder_name;
use super::{GenerationError, PassGenerator, WalletArtifact};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Serialized object layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTicketObject {
    pub object_id: String,
    pub class_id: String,
    pub state: String,
    pub barcode: String,
    pub description: TextBlock,
    pub holder: Holder,
    pub event: EventRef,
    pub meta: ObjectMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextBlock {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holder {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventRef {
    pub id: String,
    pub series: String,
    pub type_id: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// RFC 3339 with nanoseconds.
    pub issued_at: String,
    pub bin_range: String,
}

/// Builds Google Wallet event ticket objects.
pub struct GoogleObjectGenerator {
    config: GoogleWalletConfig,
    clock: Arc<dyn Clock>,
}

impl GoogleObjectGenerator {
    pub fn new(config: GoogleWalletConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Swap the clock (to freeze `issuedAt` in tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build_object(&self, ticket: &IssuedTicket) -> Result<EventTicketObject, GenerationError> {
        if ticket.id.trim().is_empty() {
            return Err(GenerationError::missing(ticket, "id"));
        }
        if self.config.issuer_email.trim().is_empty() {
            return Err(GenerationError::InvalidConfig(
                "google issuer email is required".to_string(),
            ));
        }

        Ok(EventTicketObject {
            object_id: format!("{}.{}", self.config.issuer_email, ticket.id),
            class_id: self.config.class_id.clone(),
            state: "ACTIVE".to_string(),
            barcode: ticket.barcode.clone(),
            description: TextBlock {
                text: ticket.description.clone(),
            },
            holder: Holder {
                name: resolve_holder_name(ticket).unwrap_or_default(),
            },
            event: EventRef {
                id: ticket.event_id.clone(),
                series: ticket.event_series_id.clone(),
                type_id: ticket.ticket_type_id.clone(),
                order_id: ticket.order_id.clone(),
            },
            meta: ObjectMeta {
                issued_at: format_issued_at(self.clock.now()),
                bin_range: self.config.bin_range.clone(),
            },
        })
    }
}

/// RFC 3339 in UTC with nanosecond precision, trailing fractional zeros trimmed.
fn format_issued_at(at: DateTime<Utc>) -> String {
    let full = at.to_rfc3339_opts(SecondsFormat::Nanos, true);
    let Some((seconds, fraction)) = full.strip_suffix('Z').and_then(|s| s.split_once('.')) else {
        return full;
    };
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{}Z", seconds)
    } else {
        format!("{}.{}Z", seconds, fraction)
    }
}

#[async_trait]
impl PassGenerator for GoogleObjectGenerator {
    fn channel(&self) -> Channel {
        Channel::GoogleWallet
    }

    async fn generate(&self, ticket: &IssuedTicket) -> Result<WalletArtifact, GenerationError> {
        let object = self.build_object(ticket)?;
        let data = serde_json::to_vec_pretty(&object)
            .map_err(|e| GenerationError::Encoding(format!("google object: {}", e)))?;

        debug!(ticket_id = %ticket.id, object_id = %object.object_id, "Built google wallet object");

        Ok(WalletArtifact {
            platform: Channel::GoogleWallet.platform().to_string(),
            file_name: format!("{}.json", ticket.id),
            content_type: JSON_CONTENT_TYPE.to_string(),
            data,
        })
    }
}
