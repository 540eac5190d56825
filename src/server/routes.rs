use crate::domain::filter::{self, FilterParams, Scope};
use crate::errors::{LeaderboardError, LeaderboardResult};
use crate::leaderboard::aggregate::GroupBy;
use crate::leaderboard::{self, Leaderboard, LeaderboardQuery};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/organizations/{org_id}/leaderboard", get(get_organization_leaderboard))
        .route(
            "/api/organizations/{org_id}/users/{user_id}/leaderboard",
            get(get_user_leaderboard),
        )
        .route("/api/forecasts/{forecast_id}/leaderboard", get(get_forecast_leaderboard))
        .route("/api/categories/{category_id}/leaderboard", get(get_category_leaderboard))
        .route("/api/counters", get(get_counters))
        .with_state(state)
}

/// Query string shared by every leaderboard endpoint. Lists are comma-separated.
#[derive(Debug, Default, serde::Deserialize)]
pub struct LeaderboardParams {
    pub view: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub forecast_ids: Option<String>,
    pub category_ids: Option<String>,
    pub types: Option<String>,
    pub min_forecasts: Option<String>,
    pub recent: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
}

impl LeaderboardParams {
    /// Coerce string parameters into a query. Malformed counts, dates or
    /// types are invalid filters; unknown sort names and views are not.
    pub fn into_query(self, scope: Scope) -> LeaderboardResult<LeaderboardQuery> {
        let filters = FilterParams {
            forecast_ids: filter::split_list(self.forecast_ids.as_deref()),
            category_ids: filter::split_list(self.category_ids.as_deref()),
            forecast_types: filter::parse_forecast_types(self.types.as_deref())?,
            min_group_size: filter::parse_count(self.min_forecasts.as_deref(), "min_forecasts")?,
            recent_forecasts: filter::parse_count(self.recent.as_deref(), "recent")?,
            release_from: self.from.as_deref().map(|s| filter::parse_date_bound(s, false)).transpose()?,
            release_to: self.to.as_deref().map(|s| filter::parse_date_bound(s, true)).transpose()?,
        };
        Ok(LeaderboardQuery {
            scope,
            group_by: GroupBy::parse_or_default(self.view.as_deref()),
            filters,
            sort_field: self.sort,
            sort_direction: self.direction,
        })
    }
}

/// GET /api/organizations/{org_id}/leaderboard
pub async fn get_organization_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<Leaderboard>, LeaderboardError> {
    serve(&state, Scope::Organization { organization_id: org_id }, params)
}

/// GET /api/organizations/{org_id}/users/{user_id}/leaderboard
pub async fn get_user_leaderboard(
    State(state): State<Arc<AppState>>,
    Path((org_id, user_id)): Path<(String, String)>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<Leaderboard>, LeaderboardError> {
    serve(&state, Scope::User { organization_id: org_id, user_id }, params)
}

/// GET /api/forecasts/{forecast_id}/leaderboard
pub async fn get_forecast_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(forecast_id): Path<String>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<Leaderboard>, LeaderboardError> {
    serve(&state, Scope::Forecast { forecast_id }, params)
}

/// GET /api/categories/{category_id}/leaderboard
pub async fn get_category_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<String>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<Leaderboard>, LeaderboardError> {
    serve(&state, Scope::Category { category_id }, params)
}

/// Runs synchronously on the request task; SQLite reads here are short.
fn serve(state: &AppState, scope: Scope, params: LeaderboardParams) -> Result<Json<Leaderboard>, LeaderboardError> {
    use portable_atomic::Ordering::Relaxed;

    let limit = params.limit.unwrap_or(state.config.default_result_limit);
    let result = params.into_query(scope).and_then(|query| {
        leaderboard::run_leaderboard(state.source.as_ref(), query, state.config.starting_fund_balance)
    });

    match result {
        Ok(mut board) => {
            state.counters.record_served(board.row_count);
            // group_count keeps the pre-limit total.
            board.entries.truncate(limit);
            Ok(Json(board))
        }
        Err(e @ LeaderboardError::InvalidFilter(_)) => {
            state.counters.filters_rejected.fetch_add(1, Relaxed);
            Err(e)
        }
        Err(e) => {
            state.counters.fetch_errors.fetch_add(1, Relaxed);
            tracing::error!(error = %e, "leaderboard query failed");
            Err(e)
        }
    }
}

/// GET /api/counters -- request counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "leaderboards_served": state.counters.leaderboards_served.load(Relaxed),
        "rows_aggregated": state.counters.rows_aggregated.load(Relaxed),
        "filters_rejected": state.counters.filters_rejected.load(Relaxed),
        "fetch_errors": state.counters.fetch_errors.load(Relaxed),
    }))
}
