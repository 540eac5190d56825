use crate::domain::{ForecastRef, ForecastType, PredictionRecord};
use crate::errors::{LeaderboardError, LeaderboardResult};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashSet;

// ── Scope ──

/// The slice of qualifying rows a leaderboard is computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Organization { organization_id: String },
    User { organization_id: String, user_id: String },
    Forecast { forecast_id: String },
    Category { category_id: String },
}

impl Scope {
    #[inline]
    pub fn contains(&self, row: &PredictionRecord) -> bool {
        match self {
            Self::User { user_id, .. } if row.user.id != *user_id => false,
            _ => self.covers_forecast(&row.forecast),
        }
    }

    /// Forecasts this scope draws from. A user scope covers every forecast
    /// of its organization, so forecast-level selections such as recent-N
    /// come out the same as for the organization.
    #[inline]
    pub fn covers_forecast(&self, forecast: &ForecastRef) -> bool {
        match self {
            Self::Organization { organization_id } | Self::User { organization_id, .. } => {
                forecast.organization_id == *organization_id
            }
            Self::Forecast { forecast_id } => forecast.id == *forecast_id,
            Self::Category { category_id } => forecast
                .category
                .as_ref()
                .is_some_and(|c| c.id == *category_id),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organization { organization_id } => write!(f, "organization:{organization_id}"),
            Self::User { organization_id, user_id } => {
                write!(f, "organization:{organization_id}/user:{user_id}")
            }
            Self::Forecast { forecast_id } => write!(f, "forecast:{forecast_id}"),
            Self::Category { category_id } => write!(f, "category:{category_id}"),
        }
    }
}

// ── Raw filter input ──

/// Filter values as received from a caller, before validation.
/// Empty id/type lists mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct FilterParams {
    pub forecast_ids: Vec<String>,
    pub category_ids: Vec<String>,
    pub forecast_types: Vec<ForecastType>,
    pub min_group_size: Option<i64>,
    pub recent_forecasts: Option<i64>,
    pub release_from: Option<DateTime<Utc>>,
    pub release_to: Option<DateTime<Utc>>,
}

// ── Validated filter ──

/// Conjunctive filter over qualifying rows. Only constructible through
/// `FilterSpec::validate`, so the engine never sees a malformed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    forecast_ids: Option<HashSet<String>>,
    category_ids: Option<HashSet<String>>,
    forecast_types: Option<HashSet<ForecastType>>,
    min_group_size: Option<usize>,
    recent_forecasts: Option<usize>,
    release_from: Option<DateTime<Utc>>,
    release_to: Option<DateTime<Utc>>,
}

impl FilterSpec {
    pub fn validate(params: FilterParams) -> LeaderboardResult<Self> {
        let min_group_size = match params.min_group_size {
            None => None,
            Some(n) if n >= 1 => Some(n as usize),
            Some(n) => {
                return Err(LeaderboardError::InvalidFilter(format!(
                    "minimum group size must be positive, got {n}"
                )))
            }
        };

        let recent_forecasts = match params.recent_forecasts {
            None => None,
            Some(n) if n >= 1 => Some(n as usize),
            Some(n) => {
                return Err(LeaderboardError::InvalidFilter(format!(
                    "recent forecast count must be positive, got {n}"
                )))
            }
        };

        if let (Some(from), Some(to)) = (params.release_from, params.release_to) {
            if to < from {
                return Err(LeaderboardError::InvalidFilter(format!(
                    "release date range ends ({to}) before it starts ({from})"
                )));
            }
        }

        Ok(Self {
            forecast_ids: non_empty(params.forecast_ids),
            category_ids: non_empty(params.category_ids),
            forecast_types: non_empty(params.forecast_types),
            min_group_size,
            recent_forecasts,
            release_from: params.release_from,
            release_to: params.release_to,
        })
    }

    /// Row-level predicates. Group-size and recent-N are set-level and
    /// applied elsewhere.
    #[inline]
    pub fn matches(&self, row: &PredictionRecord) -> bool {
        self.matches_forecast(&row.forecast)
    }

    /// Every row-level predicate is a property of the forecast.
    pub fn matches_forecast(&self, forecast: &ForecastRef) -> bool {
        if let Some(ids) = &self.forecast_ids {
            if !ids.contains(&forecast.id) {
                return false;
            }
        }
        if let Some(ids) = &self.category_ids {
            match &forecast.category {
                Some(c) if ids.contains(&c.id) => {}
                _ => return false,
            }
        }
        if let Some(types) = &self.forecast_types {
            if !types.contains(&forecast.forecast_type) {
                return false;
            }
        }
        if self.release_from.is_some() || self.release_to.is_some() {
            let Some(released) = forecast.release_date else {
                return false;
            };
            if self.release_from.is_some_and(|from| released < from) {
                return false;
            }
            if self.release_to.is_some_and(|to| released > to) {
                return false;
            }
        }
        true
    }

    #[inline]
    pub fn min_group_size(&self) -> Option<usize> {
        self.min_group_size
    }

    #[inline]
    pub fn recent_forecasts(&self) -> Option<usize> {
        self.recent_forecasts
    }
}

fn non_empty<T: Eq + std::hash::Hash>(values: Vec<T>) -> Option<HashSet<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values.into_iter().collect())
    }
}

// ── Scalar coercion helpers for string-typed callers ──

/// Split a comma-separated list, dropping blanks.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn parse_forecast_types(raw: Option<&str>) -> LeaderboardResult<Vec<ForecastType>> {
    split_list(raw)
        .iter()
        .map(|s| {
            ForecastType::parse(s)
                .map_err(|_| LeaderboardError::InvalidFilter(format!("unknown forecast type: {s}")))
        })
        .collect()
}

/// Parse an integer count parameter. Range checks happen in
/// `FilterSpec::validate`; this only rejects text that is not a number.
pub fn parse_count(raw: Option<&str>, name: &str) -> LeaderboardResult<Option<i64>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|e| LeaderboardError::InvalidFilter(format!("bad {name} {s:?}: {e}")))
        })
        .transpose()
}

/// Parse a release-date bound. Accepts RFC 3339 or a bare `YYYY-MM-DD`; a bare
/// date as an upper bound covers the whole day.
pub fn parse_date_bound(raw: &str, end_of_day: bool) -> LeaderboardResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| LeaderboardError::InvalidFilter(format!("bad date {raw:?}: {e}")))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| LeaderboardError::InvalidFilter(format!("bad date {raw:?}")))?;
    Ok(date.and_time(time).and_utc())
}
