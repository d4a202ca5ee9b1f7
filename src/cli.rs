//! Command-line front end.
//!
//! - `provider-dashboard login --code <CODE>`: look up the provider, remember
//!   it, and load its clients once
//! - `provider-dashboard logout`: forget the saved provider
//! - `provider-dashboard clients`: refresh and print one page of clients
//! - `provider-dashboard links`: the provider's form and telehealth links

use std::fmt::Write as _;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::DashboardError;
use crate::provider::{form_link, telehealth_link, telehealth_scan_link, ProviderStore};
use crate::records::client::RecordsClient;
use crate::services::dashboard::{kanban_columns, visible_clients, ClientPage, RefreshStatus};
use crate::state::{load_config, DashboardState};
use crate::types::{
    Config, FilterState, Pagination, SortField, SortOrder, SortState, ViewState, ViewType,
};

#[derive(Debug, Parser)]
#[command(name = "provider-dashboard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL. Overrides config.json and PROVIDER_DASHBOARD_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in with a provider code.
    Login {
        #[arg(long)]
        code: String,
    },
    /// Forget the saved provider.
    Logout,
    /// List clients for the saved provider.
    Clients(ClientsArgs),
    /// Show the provider's form and telehealth links.
    Links,
}

#[derive(Debug, Args)]
pub struct ClientsArgs {
    #[arg(long, value_enum, default_value_t = ViewArg::List)]
    pub view: ViewArg,
    /// Case-insensitive match on name, email or phone.
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long, value_enum, default_value_t = SortArg::LastContact)]
    pub sort: SortArg,
    #[arg(long, value_enum, default_value_t = OrderArg::Desc)]
    pub order: OrderArg,
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    #[arg(long)]
    pub per_page: Option<usize>,
    #[arg(long)]
    pub source: Option<String>,
    #[arg(long)]
    pub min_age: Option<u32>,
    #[arg(long)]
    pub max_age: Option<u32>,
    /// new, contacted, scheduled or converted.
    #[arg(long)]
    pub stage: Option<String>,
    /// Facial analysis label, e.g. "Ready for Review".
    #[arg(long)]
    pub analysis_status: Option<String>,
    /// Print the page as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    List,
    Cards,
    Kanban,
    FacialAnalysis,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    LastContact,
    Name,
    Age,
    Status,
    FacialAnalysisStatus,
    PhotosLiked,
    PhotosViewed,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl ClientsArgs {
    fn view_state(&self, default_per_page: usize) -> ViewState {
        ViewState {
            current_view: match self.view {
                ViewArg::List => ViewType::List,
                ViewArg::Cards => ViewType::Cards,
                ViewArg::Kanban => ViewType::Kanban,
                ViewArg::FacialAnalysis => ViewType::FacialAnalysis,
                ViewArg::Archived => ViewType::Archived,
            },
            search_query: self.search.clone().unwrap_or_default(),
            filters: FilterState {
                source: self.source.clone().unwrap_or_default(),
                age_min: self.min_age,
                age_max: self.max_age,
                analysis_status: self.analysis_status.clone().unwrap_or_default(),
                lead_stage: self.stage.clone().unwrap_or_default(),
            },
            sort: SortState {
                field: match self.sort {
                    SortArg::LastContact => SortField::LastContact,
                    SortArg::Name => SortField::Name,
                    SortArg::Age => SortField::Age,
                    SortArg::Status => SortField::Status,
                    SortArg::FacialAnalysisStatus => SortField::FacialAnalysisStatus,
                    SortArg::PhotosLiked => SortField::PhotosLiked,
                    SortArg::PhotosViewed => SortField::PhotosViewed,
                    SortArg::CreatedAt => SortField::CreatedAt,
                },
                order: match self.order {
                    OrderArg::Asc => SortOrder::Asc,
                    OrderArg::Desc => SortOrder::Desc,
                },
            },
            pagination: Pagination {
                current_page: self.page.max(1),
                items_per_page: self.per_page.unwrap_or(default_per_page).max(1),
            },
        }
    }
}

pub async fn run(cli: Cli) -> Result<(), DashboardError> {
    let mut config = load_config()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    let store = ProviderStore::default_location()?;

    match cli.command {
        Commands::Login { code } => login(config, &store, &code).await,
        Commands::Logout => {
            store.clear()?;
            println!("Logged out.");
            Ok(())
        }
        Commands::Clients(args) => list_clients(config, &store, &args).await,
        Commands::Links => {
            let provider = store.load().ok_or(DashboardError::NoProvider)?;
            println!("Form:            {}", form_link(Some(&provider)));
            println!("Telehealth:      {}", telehealth_link(Some(&provider)));
            println!("Telehealth scan: {}", telehealth_scan_link(Some(&provider)));
            if let Some(logo) = provider.logo_url() {
                println!("Logo:            {}", logo);
            }
            Ok(())
        }
    }
}

async fn login(config: Config, store: &ProviderStore, code: &str) -> Result<(), DashboardError> {
    let records = RecordsClient::from_config(&config)?;
    let provider = records.fetch_provider_by_code(code.trim()).await?;
    store.save(&provider)?;
    println!("Logged in as {} ({})", provider.name, provider.id);

    let state = DashboardState::new(config, Arc::new(records));
    let status = state.set_provider(Some(provider)).await;
    check_refresh(&status)?;
    println!("{}", status_line(&status));
    Ok(())
}

async fn list_clients(
    config: Config,
    store: &ProviderStore,
    args: &ClientsArgs,
) -> Result<(), DashboardError> {
    let provider = store.load().ok_or(DashboardError::NoProvider)?;
    let view = args.view_state(config.items_per_page);
    let state = DashboardState::from_config(config)?;

    let status = state.set_provider(Some(provider)).await;
    check_refresh(&status)?;
    if let RefreshStatus::Degraded { .. } = status {
        eprintln!("Contact history unavailable; showing clients without it.");
    }

    state.set_view(view.current_view);
    state.set_search_query(view.search_query.clone());
    state.set_filters(view.filters.clone());
    state.set_sort(view.sort);
    state.set_items_per_page(view.pagination.items_per_page);
    state.set_page(view.pagination.current_page);

    let page = visible_clients(&state.snapshot());
    if args.json {
        let json = serde_json::to_string_pretty(&page)
            .map_err(|e| DashboardError::serialization("client page", e))?;
        println!("{}", json);
    } else if view.current_view == ViewType::Kanban {
        print!("{}", render_kanban(&page));
    } else {
        print!("{}", render_table(&page));
    }
    Ok(())
}

fn check_refresh(status: &RefreshStatus) -> Result<(), DashboardError> {
    match status {
        RefreshStatus::Failed { error } => Err(DashboardError::RefreshFailed(error.clone())),
        _ => Ok(()),
    }
}

fn status_line(status: &RefreshStatus) -> String {
    match status {
        RefreshStatus::Complete { clients } => format!("Loaded {} clients.", clients),
        RefreshStatus::Degraded { clients, .. } => {
            format!("Loaded {} clients (contact history unavailable).", clients)
        }
        RefreshStatus::Failed { error } => format!("Refresh failed: {}", error),
        RefreshStatus::Superseded => "Refresh superseded.".to_string(),
    }
}

fn render_table(page: &ClientPage) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<28} {:<10} {:<16} {:<12} {:>8}",
        "NAME", "STATUS", "SOURCE", "LAST", "CONTACTS"
    );
    for client in &page.clients {
        let last = client
            .last_contact
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string());
        let _ = writeln!(
            out,
            "{:<28} {:<10} {:<16} {:<12} {:>8}",
            truncate(&client.name, 28),
            client.status.label(),
            truncate(&client.source, 16),
            last,
            client.contact_history.len()
        );
    }
    let _ = writeln!(out, "Page {}/{} ({} clients)", page.page, page.pages, page.total);
    out
}

fn render_kanban(page: &ClientPage) -> String {
    let mut out = String::new();
    for (status, clients) in kanban_columns(&page.clients) {
        let _ = writeln!(out, "{} ({})", status.label(), clients.len());
        for client in clients {
            let _ = writeln!(out, "  {}", client.name);
        }
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
