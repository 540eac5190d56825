use crate::domain::{ContinuousOutcome, ForecastType, PredictionRecord};
use crate::stats::{self, Tally};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

// ── Grouping key ──

/// Which entity a leaderboard ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Users,
    Forecasts,
    Categories,
}

impl GroupBy {
    /// Unknown views fall back to the user leaderboard.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("forecasts") | Some("forecast") => Self::Forecasts,
            Some("categories") | Some("category") => Self::Categories,
            _ => Self::Users,
        }
    }

    /// Group key of a row. Uncategorized rows have no category group.
    #[inline]
    pub fn key<'a>(&self, row: &'a PredictionRecord) -> Option<&'a str> {
        match self {
            Self::Users => Some(row.user.id.as_str()),
            Self::Forecasts => Some(row.forecast.id.as_str()),
            Self::Categories => row.forecast.category.as_ref().map(|c| c.id.as_str()),
        }
    }
}

/// Display metadata of a group, taken from the first row seen for it.
/// Fields the view does not carry stay `None` so every entry has the same shape.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct GroupIdentity {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub forecast_type: Option<ForecastType>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

impl GroupIdentity {
    fn from_row(group_by: GroupBy, id: &str, row: &PredictionRecord) -> Self {
        let category = row.forecast.category.as_ref();
        match group_by {
            GroupBy::Users => Self {
                id: id.to_string(),
                name: row.user.name.clone(),
                email: Some(row.user.email.clone()),
                ..Default::default()
            },
            GroupBy::Forecasts => Self {
                id: id.to_string(),
                name: Some(row.forecast.title.clone()),
                forecast_type: Some(row.forecast.forecast_type),
                category_id: category.map(|c| c.id.clone()),
                category_name: category.map(|c| c.name.clone()),
                category_color: category.and_then(|c| c.color.clone()),
                release_date: row.forecast.release_date,
                due_date: row.forecast.due_date,
                ..Default::default()
            },
            GroupBy::Categories => Self {
                id: id.to_string(),
                name: category.map(|c| c.name.clone()),
                category_id: category.map(|c| c.id.clone()),
                category_name: category.map(|c| c.name.clone()),
                category_color: category.and_then(|c| c.color.clone()),
                ..Default::default()
            },
        }
    }
}

// ── Per-group statistics ──

/// Everything computed for one group. Ratio fields are `None` when the group
/// has no data for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStats {
    pub identity: GroupIdentity,

    pub total_predictions: usize,
    pub binary_predictions: usize,
    pub continuous_predictions: usize,
    pub correct_predictions: usize,
    pub incorrect_predictions: usize,
    pub high_predictions: usize,
    pub low_predictions: usize,
    pub perfect_predictions: usize,
    pub unique_forecasts: usize,
    pub unique_participants: usize,

    pub accuracy_rate: Option<f64>,
    pub incorrect_rate: Option<f64>,
    pub high_rate: Option<f64>,
    pub low_rate: Option<f64>,
    pub perfect_rate: Option<f64>,
    pub average_confidence: Option<f64>,

    pub total_equity_investment: i64,
    pub total_debt_financing: f64,
    pub total_investment: f64,
    pub total_net_profit: f64,
    pub total_equity_profit: f64,
    pub total_debt_profit: f64,
    pub fund_balance: f64,

    pub roi_real: Option<f64>,
    pub roe_real: Option<f64>,
    pub rof_real: Option<f64>,
    pub roi_average: Option<f64>,
    pub roe_average: Option<f64>,
    pub rof_average: Option<f64>,
    pub roi_median: Option<f64>,
    pub roe_median: Option<f64>,
    pub rof_median: Option<f64>,

    pub error_actual_average: Option<f64>,
    pub error_actual_median: Option<f64>,
    pub error_forecast_average: Option<f64>,
    pub error_forecast_median: Option<f64>,

    pub total_estimated_time_minutes: f64,
    pub average_estimated_time_minutes: Option<f64>,
    pub hourly_profit_weighted: Option<f64>,
    pub hourly_profit_simple: Option<f64>,
}

/// Partition rows by `group_by` and reduce each group.
///
/// Groups come back in first-seen order; ordering is the caller's job.
/// Rows without a key for this view (uncategorized rows in the category
/// view) are left out.
pub fn aggregate(rows: &[PredictionRecord], group_by: GroupBy, starting_fund_balance: f64) -> Vec<GroupStats> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&PredictionRecord>)> = Vec::new();

    for row in rows {
        let Some(key) = group_by.key(row) else {
            continue;
        };
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let identity = GroupIdentity::from_row(group_by, key, members[0]);
            reduce_group(identity, &members, starting_fund_balance)
        })
        .collect()
}

/// Compute the full statistic set for one non-empty group.
pub fn reduce_group(identity: GroupIdentity, rows: &[&PredictionRecord], starting_fund_balance: f64) -> GroupStats {
    let binary: Vec<&PredictionRecord> = rows.iter().copied().filter(|r| r.is_binary_with_confidence()).collect();
    let continuous: Vec<&PredictionRecord> = rows.iter().copied().filter(|r| r.is_continuous()).collect();

    // Counts
    let correct = stats::count(&binary, |r| r.is_correct == Some(true));
    let incorrect = stats::count(&binary, |r| r.is_correct == Some(false));
    let outcome = |o: ContinuousOutcome| stats::count(&continuous, |r| r.continuous_outcome == Some(o));
    let (high, low, perfect) = (
        outcome(ContinuousOutcome::High),
        outcome(ContinuousOutcome::Low),
        outcome(ContinuousOutcome::Perfect),
    );
    let unique_forecasts = rows.iter().map(|r| r.forecast.id.as_str()).collect::<HashSet<_>>().len();
    let unique_participants = rows.iter().map(|r| r.user.id.as_str()).collect::<HashSet<_>>().len();

    // Capital
    let equity_investment: i64 = rows.iter().filter_map(|r| r.equity_investment).sum();
    let equity_tally: Tally = rows.iter().map(|r| r.equity_investment.map(|e| e as f64)).collect();
    let debt_tally: Tally = rows.iter().map(|r| r.debt_financing).collect();
    let invested: Tally = rows.iter().map(|r| r.invested_total()).collect();
    let net_profit: Tally = rows.iter().map(|r| r.net_profit()).collect();
    let equity_profit: Tally = rows.iter().map(|r| r.equity_profit).collect();
    let debt_profit: Tally = rows.iter().map(|r| r.debt_profit).collect();

    // Time
    let minutes: Tally = rows.iter().map(|r| r.estimated_time_minutes).collect();
    let hours = Tally { sum: minutes.sum / 60.0, count: minutes.count };

    GroupStats {
        identity,

        total_predictions: rows.len(),
        binary_predictions: binary.len(),
        continuous_predictions: continuous.len(),
        correct_predictions: correct,
        incorrect_predictions: incorrect,
        high_predictions: high,
        low_predictions: low,
        perfect_predictions: perfect,
        unique_forecasts,
        unique_participants,

        accuracy_rate: stats::count_ratio(correct, binary.len()),
        incorrect_rate: stats::count_ratio(incorrect, binary.len()),
        high_rate: stats::count_ratio(high, continuous.len()),
        low_rate: stats::count_ratio(low, continuous.len()),
        perfect_rate: stats::count_ratio(perfect, continuous.len()),
        average_confidence: stats::mean(binary.iter().map(|r| r.confidence)),

        total_equity_investment: equity_investment,
        total_debt_financing: debt_tally.sum,
        total_investment: invested.sum,
        total_net_profit: net_profit.sum,
        total_equity_profit: equity_profit.sum,
        total_debt_profit: debt_profit.sum,
        fund_balance: starting_fund_balance + net_profit.sum,

        roi_real: stats::ratio_of_sums(&net_profit, &invested),
        roe_real: stats::ratio_of_sums(&equity_profit, &equity_tally),
        rof_real: stats::ratio_of_sums(&debt_profit, &debt_tally),
        roi_average: stats::mean(rows.iter().map(|r| r.roi)),
        roe_average: stats::mean(rows.iter().map(|r| r.roe)),
        rof_average: stats::mean(rows.iter().map(|r| r.rof)),
        roi_median: stats::median(rows.iter().map(|r| r.roi)),
        roe_median: stats::median(rows.iter().map(|r| r.roe)),
        rof_median: stats::median(rows.iter().map(|r| r.rof)),

        error_actual_average: stats::mean(continuous.iter().map(|r| r.abs_error_pct_actual)),
        error_actual_median: stats::median(continuous.iter().map(|r| r.abs_error_pct_actual)),
        error_forecast_average: stats::mean(continuous.iter().map(|r| r.abs_error_pct_forecast)),
        error_forecast_median: stats::median(continuous.iter().map(|r| r.abs_error_pct_forecast)),

        total_estimated_time_minutes: minutes.sum,
        average_estimated_time_minutes: stats::mean(rows.iter().map(|r| r.estimated_time_minutes)),
        hourly_profit_weighted: stats::ratio_of_sums(&net_profit, &hours),
        hourly_profit_simple: stats::mean(rows.iter().map(|r| r.profit_per_hour)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures;

    const BALANCE: f64 = 250_000.0;

    fn by_id<'a>(groups: &'a [GroupStats], id: &str) -> &'a GroupStats {
        groups.iter().find(|g| g.identity.id == id).unwrap()
    }

    #[test]
    fn test_binary_accuracy_scenario() {
        // A predicts correctly, B incorrectly, C never predicted and has no row.
        let rows = vec![
            fixtures::binary("p1", "A", "f1", true),
            fixtures::binary("p2", "B", "f1", false),
        ];
        let groups = aggregate(&rows, GroupBy::Users, BALANCE);
        assert_eq!(groups.len(), 2);

        let a = by_id(&groups, "A");
        let b = by_id(&groups, "B");
        assert_eq!(a.accuracy_rate, Some(1.0));
        assert_eq!(b.accuracy_rate, Some(0.0));
        assert_eq!(b.incorrect_rate, Some(1.0));
        assert_eq!(a.total_predictions, 1);
        assert_eq!(b.total_predictions, 1);
    }

    #[test]
    fn test_capital_scenario_real_roi() {
        let mut p1 = fixtures::continuous("p1", "u1", "f1", ContinuousOutcome::High);
        p1.equity_investment = Some(1_000);
        p1.total_investment = Some(1_000.0);
        p1.profit = Some(100.0);
        p1.roi = Some(0.10);
        let mut p2 = fixtures::continuous("p2", "u1", "f2", ContinuousOutcome::Low);
        p2.equity_investment = Some(3_000);
        p2.total_investment = Some(3_000.0);
        p2.profit = Some(-50.0);
        p2.roi = Some(-50.0 / 3_000.0);

        let groups = aggregate(&[p1, p2], GroupBy::Users, BALANCE);
        let g = &groups[0];
        assert_eq!(g.total_equity_investment, 4_000);
        assert_eq!(g.total_net_profit, 50.0);
        assert_eq!(g.roi_real, Some(0.0125));
        assert_eq!(g.fund_balance, BALANCE + 50.0);

        // Mean of per-prediction ratios differs from the ratio of sums.
        let avg = g.roi_average.unwrap();
        let expected = (0.10 - 50.0 / 3_000.0) / 2.0;
        assert!((avg - expected).abs() < 1e-12, "roi_average={avg}");
        assert!((avg - 0.0125).abs() > 0.01, "average and real ROI should diverge");
    }

    #[test]
    fn test_no_binary_rows_means_absent_accuracy() {
        let rows = vec![fixtures::continuous("p1", "u1", "f1", ContinuousOutcome::Perfect)];
        let g = &aggregate(&rows, GroupBy::Users, BALANCE)[0];
        assert_eq!(g.accuracy_rate, None);
        assert_eq!(g.incorrect_rate, None);
        assert_eq!(g.perfect_rate, Some(1.0));
        assert_eq!(g.high_rate, Some(0.0));
        assert_eq!(g.roi_real, None, "no capital data means no return, not zero");
        assert_eq!(g.hourly_profit_weighted, None);
    }

    #[test]
    fn test_correct_plus_incorrect_bounded_by_total() {
        let mut unscored = fixtures::binary("p3", "u1", "f3", true);
        unscored.is_correct = None;
        let mut no_confidence = fixtures::binary("p4", "u1", "f4", true);
        no_confidence.confidence = None;
        let rows = vec![
            fixtures::binary("p1", "u1", "f1", true),
            fixtures::binary("p2", "u1", "f2", false),
            unscored,
            no_confidence,
            fixtures::continuous("p5", "u1", "f5", ContinuousOutcome::Low),
        ];
        let g = &aggregate(&rows, GroupBy::Users, BALANCE)[0];
        assert_eq!(g.total_predictions, 5);
        assert_eq!(g.binary_predictions, 3);
        assert!(g.correct_predictions + g.incorrect_predictions <= g.total_predictions);
        let expected = g.correct_predictions as f64 / g.binary_predictions as f64;
        assert_eq!(g.accuracy_rate, Some(expected));
    }

    #[test]
    fn test_error_metrics_only_from_continuous() {
        let mut b = fixtures::binary("p1", "u1", "f1", true);
        b.abs_error_pct_actual = Some(999.0);
        let mut c1 = fixtures::continuous("p2", "u1", "f2", ContinuousOutcome::High);
        c1.abs_error_pct_actual = Some(10.0);
        c1.abs_error_pct_forecast = Some(8.0);
        let mut c2 = fixtures::continuous("p3", "u1", "f3", ContinuousOutcome::Low);
        c2.abs_error_pct_actual = Some(30.0);
        let mut c3 = fixtures::continuous("p4", "u1", "f4", ContinuousOutcome::Low);
        c3.abs_error_pct_actual = Some(50.0);
        c3.abs_error_pct_forecast = Some(40.0);

        let g = &aggregate(&[b, c1, c2, c3], GroupBy::Users, BALANCE)[0];
        assert_eq!(g.error_actual_average, Some(30.0));
        assert_eq!(g.error_actual_median, Some(30.0));
        assert_eq!(g.error_forecast_average, Some(24.0));
        assert_eq!(g.error_forecast_median, Some(24.0));
    }

    #[test]
    fn test_weighted_vs_simple_hourly_profit() {
        let mut p1 = fixtures::binary("p1", "u1", "f1", true);
        p1.profit = Some(300.0);
        p1.estimated_time_minutes = Some(60.0);
        p1.profit_per_hour = Some(300.0);
        let mut p2 = fixtures::binary("p2", "u1", "f2", false);
        p2.profit = Some(-100.0);
        p2.estimated_time_minutes = Some(180.0);
        p2.profit_per_hour = Some(-100.0 / 3.0);

        let g = &aggregate(&[p1, p2], GroupBy::Users, BALANCE)[0];
        assert_eq!(g.total_estimated_time_minutes, 240.0);
        assert_eq!(g.average_estimated_time_minutes, Some(120.0));
        assert_eq!(g.hourly_profit_weighted, Some(50.0));
        let simple = g.hourly_profit_simple.unwrap();
        assert!((simple - (300.0 - 100.0 / 3.0) / 2.0).abs() < 1e-9, "simple={simple}");
    }

    #[test]
    fn test_equity_and_debt_returns() {
        let mut p = fixtures::binary("p1", "u1", "f1", true);
        p.equity_investment = Some(2_000);
        p.debt_financing = Some(1_000.0);
        p.equity_profit = Some(400.0);
        p.debt_profit = Some(-100.0);
        let g = &aggregate(&[p], GroupBy::Users, BALANCE)[0];
        assert_eq!(g.total_investment, 3_000.0);
        assert_eq!(g.total_net_profit, 300.0);
        assert_eq!(g.roe_real, Some(0.2));
        assert_eq!(g.rof_real, Some(-0.1));
        assert_eq!(g.roi_real, Some(0.1));
    }

    #[test]
    fn test_forecast_and_category_views() {
        let mut rows = vec![
            fixtures::binary("p1", "u1", "f1", true),
            fixtures::binary("p2", "u2", "f1", false),
            fixtures::binary("p3", "u1", "f2", true),
        ];
        rows[0].forecast.category = Some(fixtures::category("c1"));
        rows[1].forecast.category = Some(fixtures::category("c1"));

        let forecasts = aggregate(&rows, GroupBy::Forecasts, BALANCE);
        assert_eq!(forecasts.len(), 2);
        let f1 = by_id(&forecasts, "f1");
        assert_eq!(f1.unique_participants, 2);
        assert_eq!(f1.accuracy_rate, Some(0.5));
        assert_eq!(f1.identity.name.as_deref(), Some("Forecast f1"));
        assert_eq!(f1.identity.category_id.as_deref(), Some("c1"));
        assert_eq!(f1.identity.email, None);

        let categories = aggregate(&rows, GroupBy::Categories, BALANCE);
        assert_eq!(categories.len(), 1, "uncategorized f2 has no category group");
        assert_eq!(categories[0].total_predictions, 2);
        assert_eq!(categories[0].identity.category_color.as_deref(), Some("#336699"));
    }

    #[test]
    fn test_identity_from_first_row_and_first_seen_order() {
        let rows = vec![
            fixtures::binary("p1", "zed", "f1", true),
            fixtures::binary("p2", "amy", "f1", true),
            fixtures::binary("p3", "zed", "f2", true),
        ];
        let groups = aggregate(&rows, GroupBy::Users, BALANCE);
        let ids: Vec<&str> = groups.iter().map(|g| g.identity.id.as_str()).collect();
        assert_eq!(ids, vec!["zed", "amy"]);
        assert_eq!(groups[0].identity.email.as_deref(), Some("zed@example.com"));
        assert_eq!(groups[0].unique_forecasts, 2);
    }

    #[test]
    fn test_type_partition_covers_every_row_once() {
        let rows = vec![
            fixtures::binary("p1", "u1", "f1", true),
            fixtures::continuous("p2", "u1", "f2", ContinuousOutcome::High),
            {
                let mut p = fixtures::binary("p3", "u2", "f3", false);
                p.forecast.forecast_type = ForecastType::Categorical;
                p.is_correct = None;
                p.confidence = None;
                p
            },
        ];
        let all: usize = aggregate(&rows, GroupBy::Users, BALANCE).iter().map(|g| g.total_predictions).sum();
        let partitioned: usize = ForecastType::ALL
            .iter()
            .map(|t| {
                let subset: Vec<PredictionRecord> =
                    rows.iter().filter(|r| r.forecast.forecast_type == *t).cloned().collect();
                aggregate(&subset, GroupBy::Users, BALANCE)
                    .iter()
                    .map(|g| g.total_predictions)
                    .sum::<usize>()
            })
            .sum();
        assert_eq!(all, rows.len());
        assert_eq!(partitioned, all);
    }
}
