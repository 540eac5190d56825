use crate::domain::filter::{FilterSpec, Scope};
use crate::domain::{ForecastRef, PredictionRecord, Role};
use crate::errors::LeaderboardResult;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Data source adapter. Every implementation yields exactly the qualifying
/// rows for a scope with the row-level filters applied.
/// Send + Sync required so one source can back concurrent requests.
pub trait RowSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pure read. Errors are upstream fetch failures and are passed through.
    fn fetch_qualifying_rows(
        &self,
        scope: &Scope,
        filters: &FilterSpec,
    ) -> LeaderboardResult<Vec<PredictionRecord>>;
}

/// Rows on unresolved forecasts, or owned by administrators, never reach a leaderboard.
#[inline]
pub fn is_qualifying(row: &PredictionRecord) -> bool {
    row.forecast.actual_value_set && row.user.role == Role::Participant
}

/// Apply a validated filter to rows that already passed the qualifying gate
/// and the scope. Shared by every `RowSource` so all adapters agree.
///
/// `scope_forecasts` are the forecasts the scope covers, independent of who
/// predicted on them. Recent-N picks from those, so a user's rows are cut
/// to the same forecasts as in the organization-wide board.
pub fn apply_filters(
    rows: Vec<PredictionRecord>,
    filters: &FilterSpec,
    scope_forecasts: &[ForecastRef],
) -> Vec<PredictionRecord> {
    let mut rows: Vec<PredictionRecord> = rows.into_iter().filter(|r| filters.matches(r)).collect();

    if let Some(n) = filters.recent_forecasts() {
        let candidates = scope_forecasts
            .iter()
            .filter(|f| f.actual_value_set && filters.matches_forecast(f));
        let keep = most_recent_forecasts(candidates, n);
        rows.retain(|r| keep.contains(r.forecast.id.as_str()));
    }
    rows
}

/// Ids of the `n` forecasts with the latest release date.
/// Undated forecasts sort after every dated one; equal dates fall back to id.
fn most_recent_forecasts<'a>(forecasts: impl Iterator<Item = &'a ForecastRef>, n: usize) -> HashSet<String> {
    let mut released: HashMap<&str, Option<chrono::DateTime<chrono::Utc>>> = HashMap::new();
    for forecast in forecasts {
        released.entry(forecast.id.as_str()).or_insert(forecast.release_date);
    }

    let mut forecasts: Vec<(&str, Option<chrono::DateTime<chrono::Utc>>)> = released.into_iter().collect();
    forecasts.sort_by(|(a_id, a), (b_id, b)| {
        let by_date = match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| a_id.cmp(b_id))
    });

    forecasts.into_iter().take(n).map(|(id, _)| id.to_string()).collect()
}

// ── In-memory adapter ──

/// Row source over an already-materialized row set, e.g. a batch exported
/// by the scoring process. Its forecast catalog is whatever forecasts the
/// rows reference, including rows that never qualify.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    rows: Vec<PredictionRecord>,
}

impl InMemorySource {
    pub fn new(rows: Vec<PredictionRecord>) -> Self {
        Self { rows }
    }
}

impl RowSource for InMemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch_qualifying_rows(
        &self,
        scope: &Scope,
        filters: &FilterSpec,
    ) -> LeaderboardResult<Vec<PredictionRecord>> {
        let scoped: Vec<PredictionRecord> = self
            .rows
            .iter()
            .filter(|r| is_qualifying(r) && scope.contains(r))
            .cloned()
            .collect();
        let forecasts: Vec<ForecastRef> = if filters.recent_forecasts().is_some() {
            self.rows
                .iter()
                .map(|r| &r.forecast)
                .filter(|f| scope.covers_forecast(f))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        Ok(apply_filters(scoped, filters, &forecasts))
    }
}
