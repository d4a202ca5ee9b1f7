//! Dashboard backend record API.
//!
//! The backend fronts a table store: clients live in the "Web Popup Leads"
//! and "Patients" tables, contact events in a contact-history table. Every
//! read is scoped by provider id, never by an enumerated list of record ids,
//! so request size stays bounded however many clients a provider has.

pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod updates;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::TableSource;

/// A record as the backend returns it: an id, a free-form field map whose
/// shape depends on the table, and the store's creation timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default, rename = "createdTime", skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
}

impl RawRecord {
    /// Lenient conversion of one element of a `records` array.
    ///
    /// Only a string `id` is required. A `fields` value that is missing, null
    /// or not an object reads as an empty map.
    pub fn from_value(value: &Value) -> Option<RawRecord> {
        let object = value.as_object()?;
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())?;
        Some(RawRecord {
            id: id.to_string(),
            fields: object
                .get("fields")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            created_time: object
                .get("createdTime")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// First non-empty string among `names`. Numbers are stringified.
    pub fn text(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| match self.fields.get(*name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            // Lookup fields come back as single-element arrays.
            Value::Array(items) => items
                .iter()
                .find_map(|v| v.as_str().filter(|s| !s.trim().is_empty()))
                .map(|s| s.trim().to_string()),
            _ => None,
        })
    }

    /// Like [`RawRecord::text`] but defaulting to an empty string.
    pub fn text_or_empty(&self, names: &[&str]) -> String {
        self.text(names).unwrap_or_default()
    }

    /// First field among `names` holding a number (or a numeric string).
    pub fn number(&self, names: &[&str]) -> Option<f64> {
        names.iter().find_map(|name| match self.fields.get(*name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }

    pub fn count(&self, names: &[&str]) -> Option<u32> {
        self.number(names)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n.round() as u32)
    }

    /// Checkbox fields: absent means unchecked.
    pub fn flag(&self, names: &[&str]) -> bool {
        names.iter().any(|name| match self.fields.get(*name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            _ => false,
        })
    }

    /// Multi-select fields arrive as arrays; free-text answers as a
    /// comma-separated string. Both become a list of trimmed values.
    pub fn list(&self, names: &[&str]) -> Option<Vec<String>> {
        names.iter().find_map(|name| match self.fields.get(*name)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            Value::String(s) if !s.trim().is_empty() => Some(
                s.split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect(),
            ),
            _ => None,
        })
    }

    pub fn list_or_empty(&self, names: &[&str]) -> Vec<String> {
        self.list(names).unwrap_or_default()
    }

    /// URL of the first attachment in an attachment field, or a bare URL string.
    pub fn attachment_url(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| match self.fields.get(*name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Array(items) => items.first().and_then(attachment_url_of),
            obj @ Value::Object(_) => attachment_url_of(obj),
            _ => None,
        })
    }

    /// First linked record id in a link field (`["rec..."]`).
    pub fn first_link(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::Array(items) => items
                .first()
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Attachments look like `{url, thumbnails: {large: {url}, full: {url}}}`.
pub(crate) fn attachment_url_of(value: &Value) -> Option<String> {
    let direct = value.get("url").and_then(|u| u.as_str());
    let large = value.pointer("/thumbnails/large/url").and_then(|u| u.as_str());
    let full = value.pointer("/thumbnails/full/url").and_then(|u| u.as_str());
    direct
        .or(large)
        .or(full)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Errors from the record API.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error for {context}: {status} {message}")]
    Api {
        context: String,
        status: u16,
        message: String,
    },
    #[error("Expected JSON but got {content_type}. Response: {snippet}")]
    NotJson {
        content_type: String,
        snippet: String,
    },
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RecordsError {
    /// Transport failures and 5xx/429 responses may succeed on a manual retry.
    pub fn is_transient(&self) -> bool {
        match self {
            RecordsError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RecordsError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Read side of the record API as the aggregation pipeline sees it.
///
/// `RecordsClient` is the HTTP implementation; tests substitute canned data.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// All client records of `table` belonging to `provider_id`.
    async fn fetch_records(
        &self,
        table: TableSource,
        provider_id: &str,
    ) -> Result<Vec<RawRecord>, RecordsError>;

    /// All contact-history records linked to clients of `table` belonging to
    /// `provider_id`.
    async fn fetch_history(
        &self,
        table: TableSource,
        provider_id: &str,
    ) -> Result<Vec<RawRecord>, RecordsError>;
}
