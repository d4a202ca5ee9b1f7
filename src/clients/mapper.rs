//! Raw record → canonical `Client`.
//!
//! Leads carry the web-popup form submission fields; patients carry the
//! clinical-record field set. Both collapse into one `Client` with every field
//! defaulted, so nothing downstream branches on source shape again.

use chrono::{DateTime, Utc};

use crate::helpers::{age_on, parse_timestamp};
use crate::records::RawRecord;
use crate::types::{Client, ClientStatus, Priority, TableSource};

const UNKNOWN_NAME: &str = "Unknown";
const LEAD_SOURCE: &str = "Web Popup";
const PATIENT_SOURCE: &str = "Facial Analysis";

const LEAD_NAME_KEYS: &[&str] = &["Name", "Full Name"];
const PATIENT_NAME_KEYS: &[&str] = &["Patient Name", "Name", "Full Name"];

/// Normalize `record` from `table`. `fetched_at` stands in for a missing
/// creation time. `table_source` is always the argument, never inferred.
pub fn normalize_client(record: &RawRecord, table: TableSource, fetched_at: DateTime<Utc>) -> Client {
    let mut client = common_fields(record, table, fetched_at);
    match table {
        TableSource::Leads => apply_lead_fields(&mut client, record),
        TableSource::Patients => apply_patient_fields(&mut client, record, fetched_at),
    }
    client
}

/// Fields both tables spell the same way.
fn common_fields(record: &RawRecord, table: TableSource, fetched_at: DateTime<Utc>) -> Client {
    let created_at = record
        .text(&["Created", "Date Submitted", "Created At"])
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| record.created_time.as_deref().and_then(parse_timestamp))
        .unwrap_or(fetched_at);

    let status = record
        .text(&["Status", "Lead Status"])
        .as_deref()
        .and_then(ClientStatus::parse)
        .unwrap_or(if record.flag(&["Contacted"]) {
            ClientStatus::Contacted
        } else {
            ClientStatus::New
        });

    let priority = match record
        .text(&["Priority"])
        .map(|p| p.to_lowercase())
        .as_deref()
    {
        Some("high") => Priority::High,
        Some("low") => Priority::Low,
        _ => Priority::Medium,
    };

    let name_keys = match table {
        TableSource::Leads => LEAD_NAME_KEYS,
        TableSource::Patients => PATIENT_NAME_KEYS,
    };

    Client {
        id: record.id.clone(),
        table_source: table,
        name: record
            .text(name_keys)
            .or_else(|| joined_name(record))
            .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        email: record.text_or_empty(&["Email", "Email Address"]),
        phone: record.text_or_empty(&["Phone", "Phone Number"]),
        zip_code: record.text(&["Zip Code", "Zip", "ZIP"]),
        age: record.count(&["Age"]),
        age_range: record.text(&["Age Range"]),
        date_of_birth: None,
        goals: record.list_or_empty(&["Goals"]),
        concerns: record.list_or_empty(&["Concerns", "Skin Concerns"]),
        areas: record.list(&["Areas", "Areas of Interest"]),
        aesthetic_goals: record.text_or_empty(&["Aesthetic Goals"]),
        skin_type: record.text(&["Skin Type"]),
        skin_tone: record.text(&["Skin Tone"]),
        ethnic_background: record.text(&["Ethnic Background", "Ethnicity"]),
        engagement_level: None,
        cases_viewed_count: None,
        total_cases_available: None,
        concerns_explored: None,
        photos_liked: record.count(&["Photos Liked"]).unwrap_or(0),
        photos_viewed: record.count(&["Photos Viewed"]).unwrap_or(0),
        treatments_viewed: record.list_or_empty(&["Treatments Viewed"]),
        source: String::new(),
        status,
        priority,
        created_at,
        notes: record.text_or_empty(&["Notes"]),
        appointment_date: record.text(&["Appointment Date"]),
        treatment_received: record.text(&["Treatment Received"]),
        revenue: record.number(&["Revenue"]),
        facial_analysis_status: None,
        front_photo: None,
        all_issues: String::new(),
        interested_issues: String::new(),
        which_regions: String::new(),
        skin_complaints: String::new(),
        processed_areas_of_interest: String::new(),
        areas_of_interest_from_form: String::new(),
        archived: record.flag(&["Archived"]),
        offer_claimed: false,
        contact_history: Vec::new(),
        last_contact: None,
    }
}

fn joined_name(record: &RawRecord) -> Option<String> {
    let parts: Vec<String> = [record.text(&["First Name"]), record.text(&["Last Name"])]
        .into_iter()
        .flatten()
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Web popup form: engagement tracking from the case gallery plus the coupon.
fn apply_lead_fields(client: &mut Client, record: &RawRecord) {
    client.source = record
        .text(&["Source"])
        .unwrap_or_else(|| LEAD_SOURCE.to_string());
    client.engagement_level = record.text(&["Engagement Level"]);
    client.cases_viewed_count = record.count(&["Cases Viewed Count", "Cases Viewed"]);
    client.total_cases_available = record.count(&["Total Cases Available"]);
    client.concerns_explored = record.list(&["Concerns Explored"]);
    client.offer_claimed = record.flag(&["Coupons Claimed"]);
}

/// Patient record: facial analysis output and the intake form's free text.
fn apply_patient_fields(client: &mut Client, record: &RawRecord, fetched_at: DateTime<Utc>) {
    client.source = record
        .text(&["Source"])
        .unwrap_or_else(|| PATIENT_SOURCE.to_string());
    client.date_of_birth = record.text(&["Date of Birth", "DOB"]);
    if client.age.is_none() {
        client.age = client
            .date_of_birth
            .as_deref()
            .and_then(parse_timestamp)
            .and_then(|dob| age_on(dob.date_naive(), fetched_at.date_naive()));
    }
    client.facial_analysis_status = record.text(&["Pending/Opened"]);
    client.front_photo = record.attachment_url(&["Front Photo"]);
    client.all_issues = record.text_or_empty(&["All Issues"]);
    client.interested_issues = record.text_or_empty(&["Interested Issues"]);
    client.which_regions = record.text_or_empty(&["Which Regions"]);
    client.skin_complaints = record.text_or_empty(&["Skin Complaints"]);
    client.processed_areas_of_interest = record.text_or_empty(&["Processed Areas of Interest"]);
    client.areas_of_interest_from_form = record.text_or_empty(&["Areas of Interest (from Form)"]);
    if client.concerns.is_empty() {
        client.concerns = record.list_or_empty(&["Interested Issues"]);
    }
    if client.areas.is_none() {
        client.areas = record.list(&["Which Regions"]);
    }
    client.offer_claimed = record.flag(&["Offer Claimed"]);
}
