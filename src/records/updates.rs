//! Write-side endpoints used by the dashboard views.
//!
//! None of these are called by the aggregation pipeline; their effects show up
//! in the client list on the next refresh.

use chrono::Utc;
use serde_json::{json, Map, Value};

use super::client::{api_error, read_json, RecordsClient};
use super::{RawRecord, RecordsError};
use crate::types::{Client, ClientStatus, ContactLogEntry, TableSource};

impl RecordsClient {
    /// PATCH `fields` onto `record_id` in `table`.
    pub async fn patch_record(
        &self,
        table: TableSource,
        record_id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), RecordsError> {
        let url = self.endpoint(&["records", table.table_name(), record_id])?;
        let resp = self
            .client
            .patch(url)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(&format!("{} {}", table, record_id), status, resp).await);
        }
        Ok(())
    }

    /// Generic field update through the backend's update-record route.
    pub async fn update_record(
        &self,
        record_id: &str,
        table: TableSource,
        fields: Map<String, Value>,
    ) -> Result<(), RecordsError> {
        let url = self.endpoint(&["update-record"])?;
        let resp = self
            .client
            .post(url)
            .json(&json!({
                "recordId": record_id,
                "tableName": table.table_name(),
                "fields": fields,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(&format!("{} {}", table, record_id), status, resp).await);
        }
        Ok(())
    }

    /// Move a client along the lead stages. Anything past `new` also ticks the
    /// "Contacted" checkbox.
    pub async fn update_client_status(
        &self,
        client: &Client,
        status: ClientStatus,
    ) -> Result<(), RecordsError> {
        let mut fields = Map::new();
        fields.insert("Status".into(), json!(status.label()));
        fields.insert("Contacted".into(), json!(status != ClientStatus::New));
        self.patch_record(client.table_source, &client.id, fields).await?;
        log::info!("Client {} status set to {}", client.id, status);
        Ok(())
    }

    pub async fn set_archived(&self, client: &Client, archived: bool) -> Result<(), RecordsError> {
        let mut fields = Map::new();
        fields.insert("Archived".into(), json!(archived));
        self.patch_record(client.table_source, &client.id, fields).await
    }

    /// Facial analysis lives on patient records only. "not-started" (or empty)
    /// clears the field.
    pub async fn update_facial_analysis_status(
        &self,
        client_id: &str,
        status: &str,
    ) -> Result<(), RecordsError> {
        let value = if status.is_empty() || status == "not-started" {
            ""
        } else {
            status
        };
        let mut fields = Map::new();
        fields.insert("Pending/Opened".into(), json!(value));
        self.patch_record(TableSource::Patients, client_id, fields).await
    }

    /// Mark a lead's coupon as redeemed. Only the provider may set this; the
    /// patient-facing flow never does.
    pub async fn set_coupon_claimed(&self, record_id: &str, claimed: bool) -> Result<(), RecordsError> {
        let url = self.endpoint(&["leads", record_id, "coupon-claimed"])?;
        let resp = self
            .client
            .patch(url)
            .json(&json!({ "claimed": claimed }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error("coupon claimed", status, resp).await);
        }
        Ok(())
    }

    /// Append a contact-history row for `client`, linked through the field that
    /// matches its table. Returns the new record id.
    pub async fn log_contact(
        &self,
        client: &Client,
        entry: &ContactLogEntry,
    ) -> Result<String, RecordsError> {
        let fields = contact_history_fields(client, entry, &Utc::now().to_rfc3339());
        let url = self.endpoint(&["contact-history"])?;
        let resp = self
            .client
            .post(url)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error("contact history", status, resp).await);
        }

        let body = read_json(resp).await?;
        let record_id = body
            .pointer("/record/id")
            .or_else(|| body.get("id"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        log::info!("Logged {:?} contact for client {}", entry.entry_type, client.id);
        Ok(record_id)
    }

    /// Create a lead record from raw fields.
    pub async fn create_lead(&self, fields: Map<String, Value>) -> Result<RawRecord, RecordsError> {
        let url = self.endpoint(&["leads"])?;
        let resp = self
            .client
            .post(url)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error("create lead", status, resp).await);
        }

        let body = read_json(resp).await?;
        let record = body.get("record").cloned().unwrap_or(body);
        Ok(serde_json::from_value(record)?)
    }

    pub async fn send_sms(
        &self,
        phone: &str,
        message: &str,
        lead_id: &str,
        table: TableSource,
    ) -> Result<(), RecordsError> {
        let url = self.endpoint(&["sms"])?;
        let resp = self
            .client
            .post(url)
            .json(&json!({
                "phone": phone,
                "message": message,
                "leadId": lead_id,
                "tableSource": table.table_name(),
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error("sms", status, resp).await);
        }
        Ok(())
    }

    pub async fn submit_help_request(
        &self,
        name: &str,
        email: &str,
        message: &str,
        provider_id: &str,
    ) -> Result<(), RecordsError> {
        let url = self.endpoint(&["help-requests"])?;
        let resp = self
            .client
            .post(url)
            .json(&json!({
                "fields": {
                    "Name": name,
                    "Email": email,
                    "Message": message,
                    "Provider Id": provider_id,
                }
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error("help request", status, resp).await);
        }
        Ok(())
    }
}

/// Field map for a new contact-history row.
fn contact_history_fields(client: &Client, entry: &ContactLogEntry, date: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        client.table_source.history_link_field().into(),
        json!([client.id]),
    );
    fields.insert("Contact Type".into(), json!(entry.entry_type.label()));
    fields.insert("Outcome".into(), json!(entry.outcome.label()));
    fields.insert("Notes".into(), json!(entry.notes));
    fields.insert("Date".into(), json!(date));
    fields
}
