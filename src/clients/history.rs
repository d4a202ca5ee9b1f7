//! Raw contact-history record → `ContactHistoryEntry`.
//!
//! Type and outcome come from free-text fields by keyword. A record that does
//! not link to a client is dropped here and never reaches a `Client`.

use chrono::{DateTime, Utc};

use crate::helpers::parse_timestamp;
use crate::records::RawRecord;
use crate::types::{ContactHistoryEntry, ContactOutcome, ContactType, TableSource};

/// Outcome keywords, checked in order; the first hit wins.
const OUTCOME_KEYWORDS: &[(&[&str], ContactOutcome)] = &[
    (&["voicemail"], ContactOutcome::Voicemail),
    (&["no-show", "no show"], ContactOutcome::NoShow),
    (&["no answer", "no-answer"], ContactOutcome::NoAnswer),
    (&["scheduled"], ContactOutcome::Scheduled),
    (&["replied"], ContactOutcome::Replied),
    (&["sent"], ContactOutcome::Sent),
    (&["attended"], ContactOutcome::Attended),
    (&["cancelled", "canceled"], ContactOutcome::Cancelled),
];

/// Normalize one history record pulled for `table`.
///
/// Returns `None` when the table's link field is absent or empty. `fetched_at`
/// is the last-resort date when neither `Date` nor `createdTime` parse.
pub fn normalize_history(
    record: &RawRecord,
    table: TableSource,
    fetched_at: DateTime<Utc>,
) -> Option<ContactHistoryEntry> {
    let lead_id = record.first_link(table.history_link_field())?;

    let date = record
        .text(&["Date"])
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| record.created_time.as_deref().and_then(parse_timestamp))
        .unwrap_or(fetched_at);

    Some(ContactHistoryEntry {
        id: record.id.clone(),
        lead_id,
        entry_type: contact_type_from(&record.text_or_empty(&["Contact Type"])),
        outcome: contact_outcome_from(&record.text_or_empty(&["Outcome"])),
        notes: record.text_or_empty(&["Notes"]),
        date,
    })
}

pub fn contact_type_from(raw: &str) -> ContactType {
    let raw = raw.to_lowercase();
    if raw.contains("email") {
        ContactType::Email
    } else if raw.contains("text") {
        ContactType::Text
    } else if raw.contains("person") || raw.contains("meeting") {
        ContactType::Meeting
    } else {
        ContactType::Call
    }
}

pub fn contact_outcome_from(raw: &str) -> ContactOutcome {
    let raw = raw.to_lowercase();
    OUTCOME_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| raw.contains(k)))
        .map(|(_, outcome)| *outcome)
        .unwrap_or_default()
}
