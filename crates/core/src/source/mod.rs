//! Ticket source: the external ticketing platform.
//!
//! Provides paginated retrieval of issued tickets and check-in mutations.

mod sweep;
mod tailor;
mod types;

pub use sweep::{sweep_check_ins, SweepFailure, SweepReport};
pub use tailor::TicketTailorClient;
pub use types::{CheckAction, CheckInResponse, IssuedTicket, ListedCurrency, SourceError, TicketSource};
