//! Client normalization and enrichment.
//!
//! `mapper` and `history` turn raw records into canonical types; `enricher`
//! runs the fetches and joins history onto clients.

pub mod enricher;
pub mod history;
pub mod mapper;

pub use enricher::{aggregate_clients, RefreshOutcome};
