//! Bulk check-in / check-out across every issued ticket of a status.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{CheckAction, IssuedTicket, SourceError, TicketSource};

/// A ticket the sweep could not mutate.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SweepFailure {
    pub ticket_id: String,
    pub message: String,
}

/// Outcome of [`sweep_check_ins`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub action: Option<CheckAction>,
    pub attempted: usize,
    pub succeeded: usize,
    /// Tickets already in the requested state.
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

/// Apply `action` to every issued ticket with the given status.
///
/// Tickets already checked in (for a check-in) or not checked in (for a
/// check-out) are skipped without an upstream call. A failed listing aborts
/// the sweep. Individual mutation failures are recorded and the sweep moves
/// on to the next ticket.
pub async fn sweep_check_ins(
    source: &dyn TicketSource,
    status: &str,
    action: CheckAction,
) -> Result<SweepReport, SourceError> {
    let tickets = source.fetch_all_issued_tickets(status).await?;
    info!(
        count = tickets.len(),
        action = action.as_str(),
        "Starting check-in sweep"
    );

    let mut report = SweepReport {
        action: Some(action),
        ..Default::default()
    };

    for ticket in &tickets {
        if already_applied(ticket, action) {
            debug!(
                ticket_id = %ticket.id,
                action = action.as_str(),
                "Ticket already in requested state"
            );
            report.skipped += 1;
            continue;
        }

        report.attempted += 1;
        match source.set_check_in(&ticket.id, action).await {
            Ok(_) => report.succeeded += 1,
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "Check-in mutation failed");
                report.failures.push(SweepFailure {
                    ticket_id: ticket.id.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        skipped = report.skipped,
        failed = report.failures.len(),
        "Check-in sweep finished"
    );
    Ok(report)
}

fn already_applied(ticket: &IssuedTicket, action: CheckAction) -> bool {
    match action {
        CheckAction::CheckIn => ticket.is_checked_in(),
        CheckAction::CheckOut => !ticket.is_checked_in(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockTicketSource};

    #[tokio::test]
    async fn test_sweep_continues_past_failures() {
        let source = MockTicketSource::new();
        source
            .set_pages(vec![vec![
                fixtures::issued_ticket("it_1"),
                fixtures::issued_ticket("it_2"),
                fixtures::issued_ticket("it_3"),
            ]])
            .await;
        source.fail_check_in_for("it_2").await;

        let report = sweep_check_ins(&source, "valid", CheckAction::CheckIn)
            .await
            .unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ticket_id, "it_2");

        let calls = source.check_in_calls().await;
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(_, a)| *a == CheckAction::CheckIn));
    }

    fn checked_in(id: &str) -> IssuedTicket {
        IssuedTicket {
            checked_in: "true".to_string(),
            ..fixtures::issued_ticket(id)
        }
    }

    #[tokio::test]
    async fn test_check_in_sweep_skips_checked_in_tickets() {
        let source = MockTicketSource::new();
        source
            .set_pages(vec![vec![
                checked_in("it_1"),
                fixtures::issued_ticket("it_2"),
                checked_in("it_3"),
            ]])
            .await;

        let report = sweep_check_ins(&source, "valid", CheckAction::CheckIn)
            .await
            .unwrap();

        assert_eq!(report.attempted, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 2);
        assert!(report.failures.is_empty());
        assert_eq!(
            source.check_in_calls().await,
            vec![("it_2".to_string(), CheckAction::CheckIn)]
        );
    }

    #[tokio::test]
    async fn test_check_out_sweep_skips_tickets_not_checked_in() {
        let source = MockTicketSource::new();
        source
            .set_pages(vec![vec![
                checked_in("it_1"),
                fixtures::issued_ticket("it_2"),
            ]])
            .await;

        let report = sweep_check_ins(&source, "valid", CheckAction::CheckOut)
            .await
            .unwrap();

        assert_eq!(report.attempted, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            source.check_in_calls().await,
            vec![("it_1".to_string(), CheckAction::CheckOut)]
        );
    }

    #[tokio::test]
    async fn test_sweep_aborts_when_listing_fails() {
        let source = MockTicketSource::new();
        source
            .set_next_fetch_error(SourceError::Timeout)
            .await;

        let err = sweep_check_ins(&source, "valid", CheckAction::CheckOut)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Timeout));
        assert!(source.check_in_calls().await.is_empty());
    }
}
