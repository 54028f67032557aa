//! Locating and filling the attendee field of a pass.

use crate::source::IssuedTicket;
use crate::wallet::GenerationError;

use super::pass::{Field, Pass, PassStructure};

const FALLBACK_LABEL: &str = "Passenger";

/// Decides which field of a pre-authored template holds the attendee name.
pub trait AttendeeFieldLocator: Send + Sync {
    fn is_attendee_field(&self, field: &Field) -> bool;
}

/// Matches on label/key tokens.
///
/// Label: equals "passenger", or contains "attendee" or "name".
/// Key: contains "passenger" or "attendee".
/// Comparison is trimmed and case-insensitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyAttendeeLocator;

impl AttendeeFieldLocator for FuzzyAttendeeLocator {
    fn is_attendee_field(&self, field: &Field) -> bool {
        let label = field.label.as_deref().unwrap_or("").trim().to_lowercase();
        let key = field.key.trim().to_lowercase();

        if label.is_empty() && key.is_empty() {
            return false;
        }

        label == "passenger"
            || label.contains("attendee")
            || label.contains("name")
            || key.contains("passenger")
            || key.contains("attendee")
    }
}

/// Matches exactly one field key.
#[derive(Debug, Clone)]
pub struct ExplicitFieldKey(pub String);

impl AttendeeFieldLocator for ExplicitFieldKey {
    fn is_attendee_field(&self, field: &Field) -> bool {
        field.key.trim() == self.0.trim()
    }
}

/// Attendee display name: trimmed full name, else "first last".
pub fn resolve_holder_name(ticket: &IssuedTicket) -> Result<String, GenerationError> {
    let full = ticket.full_name.trim();
    if !full.is_empty() {
        return Ok(full.to_string());
    }

    let name = [ticket.first_name.trim(), ticket.last_name.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        return Err(GenerationError::missing(ticket, "full_name"));
    }
    Ok(name)
}

/// Write `name` into the attendee field of the pass's boarding-pass or
/// event-ticket section, appending a field when none matches.
pub fn apply_holder_name(
    pass: &mut Pass,
    name: &str,
    locator: &dyn AttendeeFieldLocator,
) -> Result<(), GenerationError> {
    if let Some(section) = pass.boarding_pass.as_mut() {
        fill_or_append(section, name, locator, "passenger");
        return Ok(());
    }

    if let Some(section) = pass.event_ticket.as_mut() {
        fill_or_append(section, name, locator, "attendee");
        return Ok(());
    }

    Err(GenerationError::Template(
        "pass has no boardingPass or eventTicket section for the holder name".to_string(),
    ))
}

fn fill_or_append(
    section: &mut PassStructure,
    name: &str,
    locator: &dyn AttendeeFieldLocator,
    fallback_key: &str,
) {
    if let Some(field) = section
        .secondary_fields
        .iter_mut()
        .find(|f| locator.is_attendee_field(f))
    {
        field.value = name.into();
        return;
    }

    section
        .secondary_fields
        .push(Field::new(fallback_key, FALLBACK_LABEL, name));
}
