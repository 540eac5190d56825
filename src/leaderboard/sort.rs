use crate::leaderboard::aggregate::GroupStats;
use crate::leaderboard::entry;
use std::cmp::Ordering;

/// Every sortable leaderboard column. The total mapping from variant to
/// accessor lives in `SortField::value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    AccuracyRate,
    TotalCompletedPredictions,
    BinaryPredictions,
    ContinuousPredictions,
    CorrectPredictions,
    IncorrectPredictions,
    IncorrectRate,
    HighPredictions,
    LowPredictions,
    PerfectPredictions,
    HighRate,
    LowRate,
    PerfectRate,
    AverageConfidence,
    UniqueForecasts,
    UniqueParticipants,
    TotalEquityInvestment,
    TotalDebtFinancing,
    TotalInvestment,
    TotalNetProfit,
    TotalEquityProfit,
    TotalDebtProfit,
    FundBalance,
    RoiReal,
    RoeReal,
    RofReal,
    RoiAverage,
    RoeAverage,
    RofAverage,
    RoiMedian,
    RoeMedian,
    RofMedian,
    ErrorActualAverage,
    ErrorActualMedian,
    ErrorForecastAverage,
    ErrorForecastMedian,
    TotalEstimatedTime,
    AverageEstimatedTime,
    HourlyProfitWeighted,
    HourlyProfitSimple,
}

impl SortField {
    pub const ALL: [SortField; 40] = [
        Self::AccuracyRate,
        Self::TotalCompletedPredictions,
        Self::BinaryPredictions,
        Self::ContinuousPredictions,
        Self::CorrectPredictions,
        Self::IncorrectPredictions,
        Self::IncorrectRate,
        Self::HighPredictions,
        Self::LowPredictions,
        Self::PerfectPredictions,
        Self::HighRate,
        Self::LowRate,
        Self::PerfectRate,
        Self::AverageConfidence,
        Self::UniqueForecasts,
        Self::UniqueParticipants,
        Self::TotalEquityInvestment,
        Self::TotalDebtFinancing,
        Self::TotalInvestment,
        Self::TotalNetProfit,
        Self::TotalEquityProfit,
        Self::TotalDebtProfit,
        Self::FundBalance,
        Self::RoiReal,
        Self::RoeReal,
        Self::RofReal,
        Self::RoiAverage,
        Self::RoeAverage,
        Self::RofAverage,
        Self::RoiMedian,
        Self::RoeMedian,
        Self::RofMedian,
        Self::ErrorActualAverage,
        Self::ErrorActualMedian,
        Self::ErrorForecastAverage,
        Self::ErrorForecastMedian,
        Self::TotalEstimatedTime,
        Self::AverageEstimatedTime,
        Self::HourlyProfitWeighted,
        Self::HourlyProfitSimple,
    ];

    /// Entry field name this column sorts by.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccuracyRate => "accuracyRate",
            Self::TotalCompletedPredictions => "totalCompletedPredictions",
            Self::BinaryPredictions => "binaryPredictions",
            Self::ContinuousPredictions => "continuousPredictions",
            Self::CorrectPredictions => "correctPredictions",
            Self::IncorrectPredictions => "incorrectPredictions",
            Self::IncorrectRate => "incorrectRate",
            Self::HighPredictions => "highPredictions",
            Self::LowPredictions => "lowPredictions",
            Self::PerfectPredictions => "perfectPredictions",
            Self::HighRate => "highRate",
            Self::LowRate => "lowRate",
            Self::PerfectRate => "perfectRate",
            Self::AverageConfidence => "averageConfidence",
            Self::UniqueForecasts => "uniqueForecasts",
            Self::UniqueParticipants => "uniqueParticipants",
            Self::TotalEquityInvestment => "totalEquityInvestment",
            Self::TotalDebtFinancing => "totalDebtFinancing",
            Self::TotalInvestment => "totalInvestment",
            Self::TotalNetProfit => "totalNetProfit",
            Self::TotalEquityProfit => "totalEquityProfit",
            Self::TotalDebtProfit => "totalDebtProfit",
            Self::FundBalance => "fundBalance",
            Self::RoiReal => "roiReal",
            Self::RoeReal => "roeReal",
            Self::RofReal => "rofReal",
            Self::RoiAverage => "roiAverage",
            Self::RoeAverage => "roeAverage",
            Self::RofAverage => "rofAverage",
            Self::RoiMedian => "roiMedian",
            Self::RoeMedian => "roeMedian",
            Self::RofMedian => "rofMedian",
            Self::ErrorActualAverage => "errorActualAverage",
            Self::ErrorActualMedian => "errorActualMedian",
            Self::ErrorForecastAverage => "errorForecastAverage",
            Self::ErrorForecastMedian => "errorForecastMedian",
            Self::TotalEstimatedTime => "totalEstimatedTime",
            Self::AverageEstimatedTime => "averageEstimatedTime",
            Self::HourlyProfitWeighted => "hourlyProfitWeighted",
            Self::HourlyProfitSimple => "hourlyProfitSimple",
        }
    }

    /// Resolve a requested column. Accepts current names, snake_case
    /// spellings and legacy alias names. Anything else is the default column.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };
        let wanted = normalize(raw);
        let target = match entry::resolve_legacy_alias(&wanted) {
            Some(current) => normalize(current),
            None => wanted,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|f| normalize(f.name()) == target)
            .unwrap_or_else(|| {
                tracing::debug!(requested = raw, "unknown sort field, using default");
                Self::default()
            })
    }

    /// Column value for a group. Counts and sums are always present.
    #[inline]
    pub fn value(&self, g: &GroupStats) -> Option<f64> {
        match self {
            Self::AccuracyRate => g.accuracy_rate,
            Self::TotalCompletedPredictions => Some(g.total_predictions as f64),
            Self::BinaryPredictions => Some(g.binary_predictions as f64),
            Self::ContinuousPredictions => Some(g.continuous_predictions as f64),
            Self::CorrectPredictions => Some(g.correct_predictions as f64),
            Self::IncorrectPredictions => Some(g.incorrect_predictions as f64),
            Self::IncorrectRate => g.incorrect_rate,
            Self::HighPredictions => Some(g.high_predictions as f64),
            Self::LowPredictions => Some(g.low_predictions as f64),
            Self::PerfectPredictions => Some(g.perfect_predictions as f64),
            Self::HighRate => g.high_rate,
            Self::LowRate => g.low_rate,
            Self::PerfectRate => g.perfect_rate,
            Self::AverageConfidence => g.average_confidence,
            Self::UniqueForecasts => Some(g.unique_forecasts as f64),
            Self::UniqueParticipants => Some(g.unique_participants as f64),
            Self::TotalEquityInvestment => Some(g.total_equity_investment as f64),
            Self::TotalDebtFinancing => Some(g.total_debt_financing),
            Self::TotalInvestment => Some(g.total_investment),
            Self::TotalNetProfit => Some(g.total_net_profit),
            Self::TotalEquityProfit => Some(g.total_equity_profit),
            Self::TotalDebtProfit => Some(g.total_debt_profit),
            Self::FundBalance => Some(g.fund_balance),
            Self::RoiReal => g.roi_real,
            Self::RoeReal => g.roe_real,
            Self::RofReal => g.rof_real,
            Self::RoiAverage => g.roi_average,
            Self::RoeAverage => g.roe_average,
            Self::RofAverage => g.rof_average,
            Self::RoiMedian => g.roi_median,
            Self::RoeMedian => g.roe_median,
            Self::RofMedian => g.rof_median,
            Self::ErrorActualAverage => g.error_actual_average,
            Self::ErrorActualMedian => g.error_actual_median,
            Self::ErrorForecastAverage => g.error_forecast_average,
            Self::ErrorForecastMedian => g.error_forecast_median,
            Self::TotalEstimatedTime => Some(g.total_estimated_time_minutes),
            Self::AverageEstimatedTime => g.average_estimated_time_minutes,
            Self::HourlyProfitWeighted => g.hourly_profit_weighted,
            Self::HourlyProfitSimple => g.hourly_profit_simple,
        }
    }
}

impl std::fmt::Display for SortField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// `accuracy_rate` and `accuracyRate` name the same column.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Anything other than an explicit ascending request sorts descending.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("asc") | Some("ascending") => Self::Asc,
            _ => Self::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn parse(field: Option<&str>, direction: Option<&str>) -> Self {
        Self {
            field: SortField::parse_or_default(field),
            direction: SortDirection::parse_or_default(direction),
        }
    }
}

/// Order groups by the requested column.
///
/// Absent values go last in either direction. Ties fall back to total
/// predictions descending, then group id for a stable result.
pub fn sort_groups(groups: &mut [GroupStats], spec: &SortSpec) {
    groups.sort_by(|a, b| compare(a, b, spec));
}

fn compare(a: &GroupStats, b: &GroupStats, spec: &SortSpec) -> Ordering {
    let primary = match (spec.field.value(a), spec.field.value(b)) {
        (Some(x), Some(y)) => match spec.direction {
            SortDirection::Asc => x.total_cmp(&y),
            SortDirection::Desc => y.total_cmp(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    primary
        .then_with(|| b.total_predictions.cmp(&a.total_predictions))
        .then_with(|| a.identity.id.cmp(&b.identity.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::aggregate::GroupIdentity;

    fn group(id: &str, accuracy: Option<f64>, total: usize) -> GroupStats {
        GroupStats {
            identity: GroupIdentity { id: id.to_string(), ..Default::default() },
            accuracy_rate: accuracy,
            total_predictions: total,
            total_net_profit: total as f64 * 10.0,
            ..Default::default()
        }
    }

    fn ids(groups: &[GroupStats]) -> Vec<&str> {
        groups.iter().map(|g| g.identity.id.as_str()).collect()
    }

    fn sample() -> Vec<GroupStats> {
        vec![
            group("a", Some(0.5), 2),
            group("b", None, 9),
            group("c", Some(0.9), 1),
            group("d", Some(0.5), 6),
            group("e", Some(0.0), 3),
        ]
    }

    #[test]
    fn test_default_sort_accuracy_desc_tiebreak_total_desc() {
        let mut groups = sample();
        sort_groups(&mut groups, &SortSpec::default());
        assert_eq!(ids(&groups), vec!["c", "d", "a", "e", "b"]);
    }

    #[test]
    fn test_nulls_last_when_ascending() {
        let mut groups = sample();
        sort_groups(&mut groups, &SortSpec::parse(Some("accuracyRate"), Some("asc")));
        assert_eq!(ids(&groups), vec!["e", "d", "a", "c", "b"]);
    }

    #[test]
    fn test_unknown_field_matches_default_ordering() {
        let mut by_default = sample();
        sort_groups(&mut by_default, &SortSpec::default());
        let mut by_unknown = sample();
        sort_groups(&mut by_unknown, &SortSpec::parse(Some("DROP TABLE users"), None));
        assert_eq!(ids(&by_default), ids(&by_unknown));
        assert_eq!(SortField::parse_or_default(Some("nope")), SortField::AccuracyRate);
        assert_eq!(SortField::parse_or_default(None), SortField::AccuracyRate);
    }

    #[test]
    fn test_parse_accepts_snake_case_and_legacy_names() {
        assert_eq!(SortField::parse_or_default(Some("roi_real")), SortField::RoiReal);
        assert_eq!(SortField::parse_or_default(Some("totalNetProfit")), SortField::TotalNetProfit);
        assert_eq!(SortField::parse_or_default(Some("averageRoi")), SortField::RoiAverage);
        assert_eq!(SortField::parse_or_default(Some("totalPredictions")), SortField::TotalCompletedPredictions);
    }

    #[test]
    fn test_every_field_name_round_trips() {
        for field in SortField::ALL {
            assert_eq!(SortField::parse_or_default(Some(field.name())), field, "{field}");
        }
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(SortDirection::parse_or_default(Some("ASC")), SortDirection::Asc);
        assert_eq!(SortDirection::parse_or_default(Some("sideways")), SortDirection::Desc);
        assert_eq!(SortDirection::parse_or_default(None), SortDirection::Desc);
    }

    #[test]
    fn test_sort_by_profit_ascending() {
        let mut groups = sample();
        sort_groups(&mut groups, &SortSpec::parse(Some("total_net_profit"), Some("asc")));
        assert_eq!(ids(&groups), vec!["c", "a", "e", "d", "b"]);
    }
}
