pub mod aggregate;
pub mod entry;
pub mod sort;

use crate::domain::filter::{FilterParams, FilterSpec, Scope};
use crate::domain::PredictionRecord;
use crate::errors::LeaderboardResult;
use crate::source::RowSource;
use aggregate::GroupBy;
use entry::LeaderboardEntry;
use sort::SortSpec;

/// One leaderboard request, as plain scalars.
#[derive(Debug, Clone)]
pub struct LeaderboardQuery {
    pub scope: Scope,
    pub group_by: GroupBy,
    pub filters: FilterParams,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
}

impl LeaderboardQuery {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            group_by: GroupBy::default(),
            filters: FilterParams::default(),
            sort_field: None,
            sort_direction: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    /// Groups that survived the minimum-size threshold.
    pub group_count: usize,
    /// Qualifying rows aggregated over, before the threshold.
    pub row_count: usize,
}

/// Validate, fetch, aggregate, rank. The only fallible step besides the
/// fetch is filter validation, which happens before any row is read.
pub fn run_leaderboard(
    source: &dyn RowSource,
    query: LeaderboardQuery,
    starting_fund_balance: f64,
) -> LeaderboardResult<Leaderboard> {
    let filters = FilterSpec::validate(query.filters).inspect_err(|e| {
        tracing::warn!(scope = %query.scope, error = %e, "rejected leaderboard filter");
    })?;
    let sort = SortSpec::parse(query.sort_field.as_deref(), query.sort_direction.as_deref());

    let rows = source.fetch_qualifying_rows(&query.scope, &filters)?;
    tracing::debug!(
        source = source.name(),
        scope = %query.scope,
        rows = rows.len(),
        view = ?query.group_by,
        sort = %sort.field,
        "aggregating leaderboard"
    );

    Ok(build_leaderboard(&rows, query.group_by, &filters, &sort, starting_fund_balance))
}

/// Aggregation over already-fetched rows: group, reduce, drop groups under
/// the minimum size, order, number.
pub fn build_leaderboard(
    rows: &[PredictionRecord],
    group_by: GroupBy,
    filters: &FilterSpec,
    sort: &SortSpec,
    starting_fund_balance: f64,
) -> Leaderboard {
    let mut groups = aggregate::aggregate(rows, group_by, starting_fund_balance);

    if let Some(min) = filters.min_group_size() {
        groups.retain(|g| g.total_predictions >= min);
    }

    sort::sort_groups(&mut groups, sort);

    let entries: Vec<LeaderboardEntry> = groups
        .into_iter()
        .enumerate()
        .map(|(i, g)| entry::assemble(i + 1, g))
        .collect();

    tracing::debug!(groups = entries.len(), rows = rows.len(), "leaderboard built");

    Leaderboard {
        group_count: entries.len(),
        row_count: rows.len(),
        entries,
    }
}
