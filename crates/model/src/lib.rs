//! Record types shared by the upstream simulator, the shadow store and the
//! dispatch layer.
//!
//! Everything here is plain serde data: entities as the upstream returns
//! them, drafts as callers submit them, list filters, and the JSON bodies
//! exchanged over `/api/contacts` and `/api/deals`.

mod contact;
mod deal;
mod error;
mod filter;
mod wire;

pub use contact::{Contact, ContactDraft, NewContact};
pub use deal::{parse_date, Deal, DealDraft, DealStage, NewDeal};
pub use error::ValidationError;
pub use filter::{ContactFilter, DealFilter};
pub use wire::{ContactCreated, ContactList, DealCreated, DealList, ErrorBody};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Current UTC time as an RFC 3339 string, the format of every `created_at`.
pub fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Reduce a required text field to its trimmed value, rejecting blanks.
pub(crate) fn required_text(
    field: &'static str,
    value: Option<String>,
) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Optional text: blanks collapse to `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
