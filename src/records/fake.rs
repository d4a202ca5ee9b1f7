//! In-memory `RecordSource` for pipeline and state tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use super::{RawRecord, RecordSource, RecordsError};
use crate::types::TableSource;

type Key = (String, TableSource);

#[derive(Default)]
pub struct FakeSource {
    records: HashMap<Key, Vec<RawRecord>>,
    history: HashMap<Key, Vec<RawRecord>>,
    fail_records: Option<TableSource>,
    fail_history: Option<TableSource>,
    broken_provider: Option<String>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    record_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, provider: &str, table: TableSource, records: Vec<RawRecord>) -> Self {
        self.records.insert((provider.to_string(), table), records);
        self
    }

    pub fn with_history(mut self, provider: &str, table: TableSource, records: Vec<RawRecord>) -> Self {
        self.history.insert((provider.to_string(), table), records);
        self
    }

    pub fn failing_records(mut self, table: TableSource) -> Self {
        self.fail_records = Some(table);
        self
    }

    /// Every record fetch for `provider` errors.
    pub fn broken_provider(mut self, provider: &str) -> Self {
        self.broken_provider = Some(provider.to_string());
        self
    }

    pub fn failing_history(mut self, table: TableSource) -> Self {
        self.fail_history = Some(table);
        self
    }

    /// Hold the leads fetch for `provider` until the returned handle is
    /// notified. The patients fetch is not held.
    pub fn gate(&self, provider: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().insert(provider.to_string(), notify.clone());
        notify
    }

    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn server_error(context: &str) -> RecordsError {
        RecordsError::Api {
            context: context.to_string(),
            status: 500,
            message: "boom".to_string(),
        }
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch_records(
        &self,
        table: TableSource,
        provider_id: &str,
    ) -> Result<Vec<RawRecord>, RecordsError> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().get(provider_id).cloned();
        if let Some(gate) = gate.filter(|_| table == TableSource::Leads) {
            gate.notified().await;
        }
        if self.fail_records == Some(table)
            || self.broken_provider.as_deref() == Some(provider_id)
        {
            return Err(Self::server_error(table.table_name()));
        }
        Ok(self
            .records
            .get(&(provider_id.to_string(), table))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_history(
        &self,
        table: TableSource,
        provider_id: &str,
    ) -> Result<Vec<RawRecord>, RecordsError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_history == Some(table) {
            return Err(Self::server_error("contact history"));
        }
        Ok(self
            .history
            .get(&(provider_id.to_string(), table))
            .cloned()
            .unwrap_or_default())
    }
}

pub fn raw(id: &str, fields: Value) -> RawRecord {
    RawRecord {
        id: id.to_string(),
        fields: fields.as_object().cloned().unwrap_or_default(),
        created_time: None,
    }
}
