use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::clients::RefreshOutcome;
use crate::error::DashboardError;
use crate::records::client::RecordsClient;
use crate::records::RecordSource;
use crate::services::dashboard::RefreshStatus;
use crate::types::{
    Client, Config, FilterState, Pagination, Provider, SortState, ViewState, ViewType,
};

/// Overrides `apiBaseUrl` from the config file.
pub const API_URL_ENV: &str = "PROVIDER_DASHBOARD_API_URL";

/// Everything a view reads. Cloning is cheap: the client list is shared.
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    pub provider: Option<Provider>,
    pub clients: Arc<Vec<Client>>,
    pub view: ViewState,
    pub loading: bool,
    pub error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Dashboard state, owned by whoever composes the app.
///
/// Writes go through the typed setters below and are published to
/// subscribers as a fresh snapshot. Only the most recently started refresh
/// may write its result; a provider change or clear invalidates any refresh
/// still in flight.
pub struct DashboardState {
    config: Config,
    source: Arc<dyn RecordSource>,
    inner: RwLock<DashboardSnapshot>,
    generation: AtomicU64,
    tx: watch::Sender<DashboardSnapshot>,
}

impl DashboardState {
    pub fn new(config: Config, source: Arc<dyn RecordSource>) -> Self {
        let initial = DashboardSnapshot {
            view: ViewState {
                pagination: Pagination {
                    current_page: 1,
                    items_per_page: config.items_per_page.max(1),
                },
                ..ViewState::default()
            },
            ..DashboardSnapshot::default()
        };
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            config,
            source,
            inner: RwLock::new(initial),
            generation: AtomicU64::new(0),
            tx,
        }
    }

    /// State backed by the HTTP record client for `config`.
    pub fn from_config(config: Config) -> Result<Self, DashboardError> {
        let client = RecordsClient::from_config(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &dyn RecordSource {
        self.source.as_ref()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.inner.read().clone()
    }

    /// The single subscription point. The receiver always holds the latest
    /// snapshot.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.tx.subscribe()
    }

    pub fn provider(&self) -> Option<Provider> {
        self.inner.read().provider.clone()
    }

    pub fn provider_id(&self) -> Option<String> {
        self.inner.read().provider.as_ref().map(|p| p.id.clone())
    }

    pub fn clients(&self) -> Arc<Vec<Client>> {
        self.inner.read().clients.clone()
    }

    pub fn view(&self) -> ViewState {
        self.inner.read().view.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.read().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.read().error.clone()
    }

    /// Mutate under the write lock and publish the result.
    fn update<R>(&self, f: impl FnOnce(&mut DashboardSnapshot) -> R) -> R {
        let mut guard = self.inner.write();
        let result = f(&mut guard);
        self.tx.send_replace(guard.clone());
        result
    }

    /// Set or clear the active provider.
    ///
    /// Setting one (again, or for the first time) runs exactly one refresh and
    /// returns how it settled. Clearing empties the client list without
    /// fetching anything.
    pub async fn set_provider(&self, provider: Option<Provider>) -> RefreshStatus {
        match provider {
            Some(provider) => {
                log::info!("Provider set to {} ({})", provider.name, provider.id);
                self.update(|s| s.provider = Some(provider));
                crate::services::dashboard::refresh_clients(self).await
            }
            None => {
                self.clear_provider();
                RefreshStatus::Complete { clients: 0 }
            }
        }
    }

    pub fn clear_provider(&self) {
        self.update(|s| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            s.provider = None;
            s.clients = Arc::new(Vec::new());
            s.loading = false;
            s.error = None;
        });
        log::info!("Provider cleared");
    }

    /// Mark a refresh as started and return its generation.
    pub fn begin_refresh(&self) -> u64 {
        self.update(|s| {
            s.loading = true;
            s.error = None;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        })
    }

    /// Store the outcome of refresh `generation`, unless a newer refresh has
    /// started (or the provider was cleared) since.
    pub fn finish_refresh(&self, generation: u64, outcome: RefreshOutcome) -> RefreshStatus {
        let mut guard = self.inner.write();
        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            log::debug!(
                "Discarding refresh {} (current generation {})",
                generation,
                current
            );
            return RefreshStatus::Superseded;
        }

        let count = outcome.clients().map_or(0, <[Client]>::len);
        let status = match outcome {
            RefreshOutcome::Complete(clients) => {
                guard.clients = Arc::new(clients);
                guard.error = None;
                RefreshStatus::Complete { clients: count }
            }
            RefreshOutcome::Degraded { clients, reason } => {
                guard.clients = Arc::new(clients);
                guard.error = None;
                RefreshStatus::Degraded {
                    clients: count,
                    reason,
                }
            }
            RefreshOutcome::Failed(e) => {
                let message = e.to_string();
                guard.clients = Arc::new(Vec::new());
                guard.error = Some(message.clone());
                RefreshStatus::Failed { error: message }
            }
        };
        guard.loading = false;
        guard.refreshed_at = Some(Utc::now());
        self.tx.send_replace(guard.clone());
        status
    }

    pub fn set_view(&self, view: ViewType) {
        self.update(|s| {
            s.view.current_view = view;
            s.view.pagination.current_page = 1;
        });
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.update(|s| {
            s.view.search_query = query;
            s.view.pagination.current_page = 1;
        });
    }

    pub fn set_filters(&self, filters: FilterState) {
        self.update(|s| {
            s.view.filters = filters;
            s.view.pagination.current_page = 1;
        });
    }

    pub fn set_sort(&self, sort: SortState) {
        self.update(|s| s.view.sort = sort);
    }

    /// 1-based. Out-of-range pages are clamped when the page is projected.
    pub fn set_page(&self, page: usize) {
        self.update(|s| s.view.pagination.current_page = page.max(1));
    }

    pub fn set_items_per_page(&self, items: usize) {
        self.update(|s| {
            s.view.pagination.items_per_page = items.max(1);
            s.view.pagination.current_page = 1;
        });
    }
}

/// Directory holding config.json and provider.json (~/.provider-dashboard)
pub fn app_dir() -> Result<PathBuf, DashboardError> {
    let home = dirs::home_dir()
        .ok_or_else(|| DashboardError::Configuration("Could not find home directory".into()))?;
    Ok(home.join(".provider-dashboard"))
}

/// Get the canonical config file path (~/.provider-dashboard/config.json)
pub fn config_path() -> Result<PathBuf, DashboardError> {
    Ok(app_dir()?.join("config.json"))
}

/// Load configuration from ~/.provider-dashboard/config.json, then apply the
/// `PROVIDER_DASHBOARD_API_URL` override.
pub fn load_config() -> Result<Config, DashboardError> {
    let mut config = load_config_from(&config_path()?)?;
    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            log::debug!("Using API URL from {}", API_URL_ENV);
            config.api_base_url = url.trim().to_string();
            validate_config(&config)?;
        }
    }
    Ok(config)
}

/// A missing file is the default config. A file that exists must parse.
pub fn load_config_from(path: &Path) -> Result<Config, DashboardError> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content).map_err(|e| DashboardError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), DashboardError> {
    let url = url::Url::parse(&config.api_base_url).map_err(|e| {
        DashboardError::Configuration(format!("Invalid apiBaseUrl {}: {}", config.api_base_url, e))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DashboardError::Configuration(format!(
            "apiBaseUrl must be http(s): {}",
            config.api_base_url
        )));
    }
    if config.request_timeout_secs == 0 {
        return Err(DashboardError::Configuration(
            "requestTimeoutSecs must be greater than zero".into(),
        ));
    }
    Ok(())
}
