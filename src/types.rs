use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration stored in ~/.provider-dashboard/config.json
///
/// Every field has a serde default so a partial (or absent) file still loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the dashboard backend (no trailing `/api`).
    #[serde(default = "default_api_base_url", alias = "backendApiUrl")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,
}

pub const DEFAULT_API_BASE_URL: &str = "https://ponce-patient-backend.vercel.app";

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_items_per_page() -> usize {
    25
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            items_per_page: default_items_per_page(),
        }
    }
}

// =============================================================================
// Record tables
// =============================================================================

/// The two backend tables a client can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableSource {
    #[serde(rename = "Web Popup Leads")]
    Leads,
    #[serde(rename = "Patients")]
    Patients,
}

impl TableSource {
    /// Table name as the backend knows it.
    pub fn table_name(&self) -> &'static str {
        match self {
            TableSource::Leads => "Web Popup Leads",
            TableSource::Patients => "Patients",
        }
    }

    /// Linked-record field on a contact-history row that points back at a
    /// client of this table.
    pub fn history_link_field(&self) -> &'static str {
        match self {
            TableSource::Leads => "Web Popup Lead",
            TableSource::Patients => "Patient",
        }
    }
}

impl std::fmt::Display for TableSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

// =============================================================================
// Provider
// =============================================================================

/// The clinic whose clients are shown. Anything the backend returns beyond
/// id/name/code (logo, form links, scan URLs) is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// Contact history
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContactType {
    #[default]
    Call,
    Email,
    Text,
    Meeting,
}

impl ContactType {
    /// Label written to the backend's "Contact Type" field.
    pub fn label(&self) -> &'static str {
        match self {
            ContactType::Call => "Phone Call",
            ContactType::Email => "Email",
            ContactType::Text => "Text Message",
            ContactType::Meeting => "In-Person",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContactOutcome {
    #[default]
    Reached,
    Voicemail,
    NoAnswer,
    Scheduled,
    Sent,
    Replied,
    Attended,
    NoShow,
    Cancelled,
}

impl ContactOutcome {
    /// Label written to the backend's "Outcome" field.
    pub fn label(&self) -> &'static str {
        match self {
            ContactOutcome::Reached => "Reached",
            ContactOutcome::Voicemail => "Left Voicemail",
            ContactOutcome::NoAnswer => "No Answer",
            ContactOutcome::Scheduled => "Scheduled Appointment",
            ContactOutcome::Sent => "Sent",
            ContactOutcome::Replied => "Replied",
            ContactOutcome::Attended => "Attended",
            ContactOutcome::NoShow => "No-Show",
            ContactOutcome::Cancelled => "Cancelled",
        }
    }
}

/// A single contact event linked to exactly one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactHistoryEntry {
    pub id: String,
    /// `Client::id` of the lead *or* patient this event belongs to.
    pub lead_id: String,
    #[serde(rename = "type")]
    pub entry_type: ContactType,
    pub outcome: ContactOutcome,
    pub notes: String,
    pub date: DateTime<Utc>,
}

/// A contact the provider wants to log against a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactLogEntry {
    #[serde(rename = "type")]
    pub entry_type: ContactType,
    pub outcome: ContactOutcome,
    #[serde(default)]
    pub notes: String,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    New,
    Contacted,
    Scheduled,
    Converted,
}

impl ClientStatus {
    /// Label written to the backend's "Status" field.
    pub fn label(&self) -> &'static str {
        match self {
            ClientStatus::New => "New",
            ClientStatus::Contacted => "Contacted",
            ClientStatus::Scheduled => "Scheduled",
            ClientStatus::Converted => "Converted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "new" => Some(ClientStatus::New),
            "contacted" => Some(ClientStatus::Contacted),
            "scheduled" => Some(ClientStatus::Scheduled),
            "converted" => Some(ClientStatus::Converted),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// Canonical client, whichever table it came from.
///
/// `contact_history` is newest-first and `last_contact` is always the date of
/// its first entry (or `None` when empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub table_source: TableSource,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub zip_code: Option<String>,
    pub age: Option<u32>,
    pub age_range: Option<String>,
    pub date_of_birth: Option<String>,
    pub goals: Vec<String>,
    pub concerns: Vec<String>,
    pub areas: Option<Vec<String>>,
    pub aesthetic_goals: String,
    pub skin_type: Option<String>,
    pub skin_tone: Option<String>,
    pub ethnic_background: Option<String>,
    pub engagement_level: Option<String>,
    pub cases_viewed_count: Option<u32>,
    pub total_cases_available: Option<u32>,
    pub concerns_explored: Option<Vec<String>>,
    pub photos_liked: u32,
    pub photos_viewed: u32,
    pub treatments_viewed: Vec<String>,
    pub source: String,
    pub status: ClientStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub notes: String,
    pub appointment_date: Option<String>,
    pub treatment_received: Option<String>,
    pub revenue: Option<f64>,
    pub facial_analysis_status: Option<String>,
    pub front_photo: Option<String>,
    pub all_issues: String,
    pub interested_issues: String,
    pub which_regions: String,
    pub skin_complaints: String,
    pub processed_areas_of_interest: String,
    pub areas_of_interest_from_form: String,
    pub archived: bool,
    pub offer_claimed: bool,
    pub contact_history: Vec<ContactHistoryEntry>,
    pub last_contact: Option<DateTime<Utc>>,
}

// =============================================================================
// View selection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewType {
    #[default]
    List,
    Cards,
    Kanban,
    FacialAnalysis,
    Archived,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// Exact (case-insensitive) match on `Client::source`; empty = any.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub age_min: Option<u32>,
    #[serde(default)]
    pub age_max: Option<u32>,
    /// Facial analysis status label (see `helpers::format_facial_status`).
    #[serde(default)]
    pub analysis_status: String,
    /// Client status name; empty = any.
    #[serde(default)]
    pub lead_stage: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    LastContact,
    Name,
    Age,
    Status,
    FacialAnalysisStatus,
    PhotosLiked,
    PhotosViewed,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortState {
    pub field: SortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub items_per_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            items_per_page: default_items_per_page(),
        }
    }
}

/// Everything the view layer selects: which view, what to search, how to
/// filter/sort/page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub current_view: ViewType,
    pub search_query: String,
    pub filters: FilterState,
    pub sort: SortState,
    pub pagination: Pagination,
}
