//! Provider dashboard back end.
//!
//! Pulls a provider's leads and patients from the dashboard backend, merges
//! them into one client list, attaches each client's contact history, and
//! keeps the result in a subscribable store that views project from.

pub mod cli;
pub mod clients;
pub mod error;
pub mod helpers;
pub mod provider;
pub mod records;
pub mod services;
pub mod state;
pub mod types;

pub use clients::{aggregate_clients, RefreshOutcome};
pub use error::{DashboardError, ErrorReport};
pub use records::{RawRecord, RecordSource, RecordsError};
pub use services::dashboard::{refresh_clients, refresh_clients_for, visible_clients, RefreshStatus};
pub use state::{DashboardSnapshot, DashboardState};
