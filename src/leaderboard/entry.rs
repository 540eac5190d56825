//! Public leaderboard entry shape.
//!
//! Pure renaming of `GroupStats`, plus the legacy alias fields older
//! consumers still read. No statistic is computed here.

use crate::domain::ForecastType;
use crate::leaderboard::aggregate::GroupStats;
use chrono::{DateTime, Utc};

/// Legacy field name -> current field it mirrors.
/// Older consumers read the left-hand names; new code should read the right.
pub const LEGACY_ALIASES: &[(&str, &str)] = &[
    ("totalPredictions", "totalCompletedPredictions"),
    ("accuracy", "accuracyRate"),
    ("totalProfit", "totalNetProfit"),
    ("roi", "roiReal"),
    ("roe", "roeReal"),
    ("rof", "rofReal"),
    ("averageRoi", "roiAverage"),
    ("averageRoe", "roeAverage"),
    ("averageRof", "rofAverage"),
    ("medianRoi", "roiMedian"),
    ("medianRoe", "roeMedian"),
    ("medianRof", "rofMedian"),
    ("averageError", "errorActualAverage"),
    ("medianError", "errorActualMedian"),
    ("profitPerHour", "hourlyProfitSimple"),
];

/// Current field name for a legacy alias. Matching ignores case, `_` and `-`.
pub fn resolve_legacy_alias(name: &str) -> Option<&'static str> {
    let wanted: String = name
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    LEGACY_ALIASES
        .iter()
        .find(|(legacy, _)| legacy.eq_ignore_ascii_case(&wanted))
        .map(|(_, current)| *current)
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,

    // Identity
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub forecast_type: Option<ForecastType>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,

    // Counts
    pub total_completed_predictions: usize,
    pub binary_predictions: usize,
    pub continuous_predictions: usize,
    pub correct_predictions: usize,
    pub incorrect_predictions: usize,
    pub high_predictions: usize,
    pub low_predictions: usize,
    pub perfect_predictions: usize,
    pub unique_forecasts: usize,
    pub unique_participants: usize,

    // Rates
    pub accuracy_rate: Option<f64>,
    pub incorrect_rate: Option<f64>,
    pub high_rate: Option<f64>,
    pub low_rate: Option<f64>,
    pub perfect_rate: Option<f64>,
    pub average_confidence: Option<f64>,

    // Capital
    pub total_equity_investment: i64,
    pub total_debt_financing: f64,
    pub total_investment: f64,
    pub total_net_profit: f64,
    pub total_equity_profit: f64,
    pub total_debt_profit: f64,
    pub fund_balance: f64,

    // Returns: ratio of sums / mean of ratios / median of ratios
    pub roi_real: Option<f64>,
    pub roe_real: Option<f64>,
    pub rof_real: Option<f64>,
    pub roi_average: Option<f64>,
    pub roe_average: Option<f64>,
    pub rof_average: Option<f64>,
    pub roi_median: Option<f64>,
    pub roe_median: Option<f64>,
    pub rof_median: Option<f64>,

    // Error, continuous only
    pub error_actual_average: Option<f64>,
    pub error_actual_median: Option<f64>,
    pub error_forecast_average: Option<f64>,
    pub error_forecast_median: Option<f64>,

    // Time
    pub total_estimated_time: f64,
    pub average_estimated_time: Option<f64>,
    pub hourly_profit_weighted: Option<f64>,
    pub hourly_profit_simple: Option<f64>,

    #[serde(flatten)]
    pub legacy: LegacyFields,
}

/// Mirrors of current fields under their pre-split names. See `LEGACY_ALIASES`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFields {
    pub total_predictions: usize,
    pub accuracy: Option<f64>,
    pub total_profit: f64,
    pub roi: Option<f64>,
    pub roe: Option<f64>,
    pub rof: Option<f64>,
    pub average_roi: Option<f64>,
    pub average_roe: Option<f64>,
    pub average_rof: Option<f64>,
    pub median_roi: Option<f64>,
    pub median_roe: Option<f64>,
    pub median_rof: Option<f64>,
    pub average_error: Option<f64>,
    pub median_error: Option<f64>,
    pub profit_per_hour: Option<f64>,
}

impl LegacyFields {
    fn mirror(g: &GroupStats) -> Self {
        Self {
            total_predictions: g.total_predictions,
            accuracy: g.accuracy_rate,
            total_profit: g.total_net_profit,
            roi: g.roi_real,
            roe: g.roe_real,
            rof: g.rof_real,
            average_roi: g.roi_average,
            average_roe: g.roe_average,
            average_rof: g.rof_average,
            median_roi: g.roi_median,
            median_roe: g.roe_median,
            median_rof: g.rof_median,
            average_error: g.error_actual_average,
            median_error: g.error_actual_median,
            profit_per_hour: g.hourly_profit_simple,
        }
    }
}

/// Build the public entry for a group at 1-based position `rank`.
pub fn assemble(rank: usize, g: GroupStats) -> LeaderboardEntry {
    let legacy = LegacyFields::mirror(&g);
    let identity = g.identity;
    LeaderboardEntry {
        rank,
        id: identity.id,
        name: identity.name,
        email: identity.email,
        forecast_type: identity.forecast_type,
        category_id: identity.category_id,
        category_name: identity.category_name,
        category_color: identity.category_color,
        release_date: identity.release_date,
        due_date: identity.due_date,

        total_completed_predictions: g.total_predictions,
        binary_predictions: g.binary_predictions,
        continuous_predictions: g.continuous_predictions,
        correct_predictions: g.correct_predictions,
        incorrect_predictions: g.incorrect_predictions,
        high_predictions: g.high_predictions,
        low_predictions: g.low_predictions,
        perfect_predictions: g.perfect_predictions,
        unique_forecasts: g.unique_forecasts,
        unique_participants: g.unique_participants,

        accuracy_rate: g.accuracy_rate,
        incorrect_rate: g.incorrect_rate,
        high_rate: g.high_rate,
        low_rate: g.low_rate,
        perfect_rate: g.perfect_rate,
        average_confidence: g.average_confidence,

        total_equity_investment: g.total_equity_investment,
        total_debt_financing: g.total_debt_financing,
        total_investment: g.total_investment,
        total_net_profit: g.total_net_profit,
        total_equity_profit: g.total_equity_profit,
        total_debt_profit: g.total_debt_profit,
        fund_balance: g.fund_balance,

        roi_real: g.roi_real,
        roe_real: g.roe_real,
        rof_real: g.rof_real,
        roi_average: g.roi_average,
        roe_average: g.roe_average,
        rof_average: g.rof_average,
        roi_median: g.roi_median,
        roe_median: g.roe_median,
        rof_median: g.rof_median,

        error_actual_average: g.error_actual_average,
        error_actual_median: g.error_actual_median,
        error_forecast_average: g.error_forecast_average,
        error_forecast_median: g.error_forecast_median,

        total_estimated_time: g.total_estimated_time_minutes,
        average_estimated_time: g.average_estimated_time_minutes,
        hourly_profit_weighted: g.hourly_profit_weighted,
        hourly_profit_simple: g.hourly_profit_simple,

        legacy,
    }
}
