//! Client aggregation and contact-history enrichment.
//!
//! One refresh pulls leads and patients (primary) alongside both tables'
//! contact history (enrichment). The two phases run concurrently; the merge
//! waits for both. Primary failure fails the refresh. Enrichment failure
//! degrades it: clients come back without history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::clients::history::normalize_history;
use crate::clients::mapper::normalize_client;
use crate::records::{RecordSource, RecordsError};
use crate::types::{Client, ContactHistoryEntry, TableSource};

/// Result of one aggregation run.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Clients and history both loaded.
    Complete(Vec<Client>),
    /// Clients loaded; history did not, so every client has an empty history.
    Degraded { clients: Vec<Client>, reason: String },
    /// Client records could not be loaded.
    Failed(RecordsError),
}

impl RefreshOutcome {
    pub fn clients(&self) -> Option<&[Client]> {
        match self {
            RefreshOutcome::Complete(clients) | RefreshOutcome::Degraded { clients, .. } => {
                Some(clients.as_slice())
            }
            RefreshOutcome::Failed(_) => None,
        }
    }
}

/// Build the enriched client list for `provider_id`.
///
/// No provider means no clients and no fetch.
pub async fn aggregate_clients(source: &dyn RecordSource, provider_id: Option<&str>) -> RefreshOutcome {
    let Some(provider_id) = provider_id.filter(|id| !id.is_empty()) else {
        return RefreshOutcome::Complete(Vec::new());
    };
    let fetched_at = Utc::now();

    let (clients, history) = tokio::join!(
        fetch_clients(source, provider_id, fetched_at),
        fetch_history(source, provider_id, fetched_at),
    );

    let clients = match clients {
        Ok(clients) => clients,
        Err(e) => {
            log::error!("Failed to fetch clients for provider {}: {}", provider_id, e);
            return RefreshOutcome::Failed(e);
        }
    };

    match history {
        Ok(history) => {
            let entries = history.len();
            let clients = attach_history(clients, &group_history(history));
            log::info!(
                "Loaded {} clients with {} contact-history entries for provider {}",
                clients.len(),
                entries,
                provider_id
            );
            RefreshOutcome::Complete(clients)
        }
        Err(e) => {
            log::warn!("Failed to fetch contact history, continuing without it: {}", e);
            RefreshOutcome::Degraded {
                clients,
                reason: e.to_string(),
            }
        }
    }
}

/// Leads then patients, normalized. Both fetches start together.
async fn fetch_clients(
    source: &dyn RecordSource,
    provider_id: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<Client>, RecordsError> {
    let (leads, patients) = tokio::try_join!(
        source.fetch_records(TableSource::Leads, provider_id),
        source.fetch_records(TableSource::Patients, provider_id),
    )?;

    Ok(leads
        .iter()
        .map(|r| normalize_client(r, TableSource::Leads, fetched_at))
        .chain(
            patients
                .iter()
                .map(|r| normalize_client(r, TableSource::Patients, fetched_at)),
        )
        .collect())
}

/// Both tables' history, normalized, unlinked rows dropped.
async fn fetch_history(
    source: &dyn RecordSource,
    provider_id: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<ContactHistoryEntry>, RecordsError> {
    let (leads, patients) = tokio::try_join!(
        source.fetch_history(TableSource::Leads, provider_id),
        source.fetch_history(TableSource::Patients, provider_id),
    )?;

    Ok(leads
        .iter()
        .filter_map(|r| normalize_history(r, TableSource::Leads, fetched_at))
        .chain(
            patients
                .iter()
                .filter_map(|r| normalize_history(r, TableSource::Patients, fetched_at)),
        )
        .collect())
}

/// Group entries by client id, each group newest-first.
///
/// The sort is stable, so entries sharing a date keep their fetch order.
pub fn group_history(entries: Vec<ContactHistoryEntry>) -> HashMap<String, Vec<ContactHistoryEntry>> {
    let mut groups: HashMap<String, Vec<ContactHistoryEntry>> = HashMap::new();
    for entry in entries {
        groups.entry(entry.lead_id.clone()).or_default().push(entry);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| b.date.cmp(&a.date));
    }
    groups
}

/// Give every client its history group and derive `last_contact` from it.
pub fn attach_history(
    clients: Vec<Client>,
    groups: &HashMap<String, Vec<ContactHistoryEntry>>,
) -> Vec<Client> {
    clients
        .into_iter()
        .map(|mut client| {
            let history = groups.get(&client.id).cloned().unwrap_or_default();
            client.last_contact = history.first().map(|e| e.date);
            client.contact_history = history;
            client
        })
        .collect()
}
