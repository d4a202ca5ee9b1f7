// Dashboard service
// Refresh orchestration against the state store, and the client-list
// projection each view renders (search, filters, sort, paging).

use std::cmp::Ordering;

use crate::clients::aggregate_clients;
use crate::helpers::format_facial_status;
use crate::state::{DashboardSnapshot, DashboardState};
use crate::types::{
    Client, ClientStatus, FilterState, SortField, SortOrder, SortState, ViewState, ViewType,
};

/// How a refresh settled
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RefreshStatus {
    Complete { clients: usize },
    Degraded { clients: usize, reason: String },
    Failed { error: String },
    /// A newer refresh started (or the provider was cleared) before this one
    /// finished; its result was dropped.
    Superseded,
}

/// Refresh the client list for whichever provider is current.
pub async fn refresh_clients(state: &DashboardState) -> RefreshStatus {
    let provider_id = state.provider_id();
    refresh_clients_for(state, provider_id.as_deref()).await
}

/// Fetch, merge and enrich clients for `provider_id`, then store the result.
///
/// Never retries. A failed refresh empties the client list and records the
/// error; a degraded one stores clients without history and records nothing.
pub async fn refresh_clients_for(state: &DashboardState, provider_id: Option<&str>) -> RefreshStatus {
    let generation = state.begin_refresh();
    let outcome = aggregate_clients(state.source(), provider_id).await;
    let status = state.finish_refresh(generation, outcome);

    match &status {
        RefreshStatus::Complete { clients } => {
            log::info!("Refresh {} complete: {} clients", generation, clients)
        }
        RefreshStatus::Degraded { clients, reason } => log::warn!(
            "Refresh {} degraded: {} clients without contact history ({})",
            generation,
            clients,
            reason
        ),
        RefreshStatus::Failed { error } => log::error!("Refresh {} failed: {}", generation, error),
        RefreshStatus::Superseded => log::debug!("Refresh {} superseded", generation),
    }
    status
}

/// One page of the projected client list.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPage {
    pub clients: Vec<Client>,
    /// Matches across all pages.
    pub total: usize,
    /// 1-based, clamped into `1..=pages`.
    pub page: usize,
    pub pages: usize,
}

pub fn visible_clients(snapshot: &DashboardSnapshot) -> ClientPage {
    project_clients(&snapshot.clients, &snapshot.view)
}

/// Apply view, search, filters, sort and pagination to `clients`.
pub fn project_clients(clients: &[Client], view: &ViewState) -> ClientPage {
    let query = view.search_query.trim().to_lowercase();
    let mut matched: Vec<&Client> = clients
        .iter()
        .filter(|c| in_view(c, view.current_view))
        .filter(|c| matches_search(c, &query))
        .filter(|c| matches_filters(c, &view.filters))
        .collect();

    matched.sort_by(|a, b| compare_clients(a, b, view.sort));

    let per_page = view.pagination.items_per_page.max(1);
    let total = matched.len();
    let pages = total.div_ceil(per_page).max(1);
    let page = view.pagination.current_page.clamp(1, pages);

    ClientPage {
        clients: matched
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect(),
        total,
        page,
        pages,
    }
}

/// Kanban columns in pipeline order, each keeping the projection's sort.
pub fn kanban_columns(clients: &[Client]) -> Vec<(ClientStatus, Vec<&Client>)> {
    [
        ClientStatus::New,
        ClientStatus::Contacted,
        ClientStatus::Scheduled,
        ClientStatus::Converted,
    ]
    .into_iter()
    .map(|status| {
        (
            status,
            clients.iter().filter(|c| c.status == status).collect(),
        )
    })
    .collect()
}

fn in_view(client: &Client, view: ViewType) -> bool {
    match view {
        ViewType::Archived => client.archived,
        _ => !client.archived,
    }
}

fn matches_search(client: &Client, query: &str) -> bool {
    query.is_empty()
        || client.name.to_lowercase().contains(query)
        || client.email.to_lowercase().contains(query)
        || client.phone.to_lowercase().contains(query)
}

fn matches_filters(client: &Client, filters: &FilterState) -> bool {
    if !filters.source.is_empty() && !client.source.eq_ignore_ascii_case(&filters.source) {
        return false;
    }

    // With an age bound set, clients of unknown age drop out.
    if filters.age_min.is_some() || filters.age_max.is_some() {
        let Some(age) = client.age else {
            return false;
        };
        if filters.age_min.is_some_and(|min| age < min) || filters.age_max.is_some_and(|max| age > max) {
            return false;
        }
    }

    if !filters.analysis_status.is_empty() {
        let label = format_facial_status(client.facial_analysis_status.as_deref());
        if !label.eq_ignore_ascii_case(filters.analysis_status.trim()) {
            return false;
        }
    }

    if !filters.lead_stage.is_empty() && ClientStatus::parse(&filters.lead_stage) != Some(client.status) {
        return false;
    }

    true
}

fn compare_clients(a: &Client, b: &Client, sort: SortState) -> Ordering {
    let directed = |ordering: Ordering| match sort.order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    };

    match sort.field {
        SortField::LastContact => nulls_last(a.last_contact, b.last_contact, directed),
        SortField::Age => nulls_last(a.age, b.age, directed),
        SortField::Name => directed(a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        SortField::Status => directed(a.status.cmp(&b.status)),
        SortField::FacialAnalysisStatus => directed(
            format_facial_status(a.facial_analysis_status.as_deref())
                .cmp(&format_facial_status(b.facial_analysis_status.as_deref())),
        ),
        SortField::PhotosLiked => directed(a.photos_liked.cmp(&b.photos_liked)),
        SortField::PhotosViewed => directed(a.photos_viewed.cmp(&b.photos_viewed)),
        SortField::CreatedAt => directed(a.created_at.cmp(&b.created_at)),
    }
}

/// Missing values sort last in either direction.
fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>, directed: impl Fn(Ordering) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
