pub mod filter;

use crate::errors::{LeaderboardError, LeaderboardResult};
use chrono::{DateTime, Utc};

// ── Enumerations stored as text ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ForecastType {
    Binary,
    Continuous,
    Categorical,
}

impl ForecastType {
    pub const ALL: [ForecastType; 3] = [Self::Binary, Self::Continuous, Self::Categorical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "BINARY",
            Self::Continuous => "CONTINUOUS",
            Self::Categorical => "CATEGORICAL",
        }
    }

    /// Case-insensitive parse of the stored text form.
    pub fn parse(s: &str) -> LeaderboardResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BINARY" => Ok(Self::Binary),
            "CONTINUOUS" => Ok(Self::Continuous),
            "CATEGORICAL" => Ok(Self::Categorical),
            other => Err(LeaderboardError::Parse(format!("unknown forecast type: {other}"))),
        }
    }
}

impl std::fmt::Display for ForecastType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organization role. Only plain participants appear on leaderboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Role {
    #[serde(rename = "USER")]
    Participant,
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "SUPER_ADMIN")]
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Participant => "USER",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    pub fn parse(s: &str) -> LeaderboardResult<Self> {
        match s {
            "USER" => Ok(Self::Participant),
            "ADMIN" => Ok(Self::Admin),
            "SUPER_ADMIN" => Ok(Self::SuperAdmin),
            other => Err(LeaderboardError::Parse(format!("unknown role: {other}"))),
        }
    }
}

/// Scoring classification of a continuous prediction against the actual value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContinuousOutcome {
    High,
    Low,
    Perfect,
}

impl ContinuousOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Low => "LOW",
            Self::Perfect => "PERFECT",
        }
    }

    pub fn parse(s: &str) -> LeaderboardResult<Self> {
        match s {
            "HIGH" => Ok(Self::High),
            "LOW" => Ok(Self::Low),
            "PERFECT" => Ok(Self::Perfect),
            other => Err(LeaderboardError::Parse(format!("unknown continuous outcome: {other}"))),
        }
    }
}

// ── Row types consumed from the data layer ──

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct UserRef {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ForecastRef {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub forecast_type: ForecastType,
    pub category: Option<CategoryRef>,
    pub release_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    /// False until the forecast's actual outcome has been recorded.
    pub actual_value_set: bool,
}

/// One scored prediction (user x forecast).
///
/// Every metric field is materialized by the scoring process when the
/// forecast's actual value is recorded. `None` means the scorer left the
/// column empty, e.g. `is_correct` on a continuous forecast.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PredictionRecord {
    pub id: String,
    pub user: UserRef,
    pub forecast: ForecastRef,
    /// Binary forecasts only.
    pub is_correct: Option<bool>,
    /// Continuous forecasts only.
    pub continuous_outcome: Option<ContinuousOutcome>,
    /// 0-100, binary forecasts only.
    pub confidence: Option<f64>,
    /// Whole currency units, 0..=`MAX_EQUITY_INVESTMENT`.
    pub equity_investment: Option<i64>,
    pub debt_financing: Option<f64>,
    pub total_investment: Option<f64>,
    pub profit: Option<f64>,
    pub equity_profit: Option<f64>,
    pub debt_profit: Option<f64>,
    pub roi: Option<f64>,
    pub roe: Option<f64>,
    pub rof: Option<f64>,
    pub abs_error_pct_actual: Option<f64>,
    pub abs_error_pct_forecast: Option<f64>,
    pub estimated_time_minutes: Option<f64>,
    pub profit_per_hour: Option<f64>,
}

pub const MAX_EQUITY_INVESTMENT: i64 = 20_000_000;

impl PredictionRecord {
    /// Binary prediction that carries a confidence; the denominator for accuracy.
    #[inline]
    pub fn is_binary_with_confidence(&self) -> bool {
        self.forecast.forecast_type == ForecastType::Binary && self.confidence.is_some()
    }

    #[inline]
    pub fn is_continuous(&self) -> bool {
        self.forecast.forecast_type == ForecastType::Continuous
    }

    /// Total capital committed; equity + debt when the scorer left the total empty.
    pub fn invested_total(&self) -> Option<f64> {
        self.total_investment.or_else(|| match (self.equity_investment, self.debt_financing) {
            (None, None) => None,
            (e, d) => Some(e.unwrap_or(0) as f64 + d.unwrap_or(0.0)),
        })
    }

    /// Net realized profit; equity + debt profit when the scorer left the net empty.
    pub fn net_profit(&self) -> Option<f64> {
        self.profit.or_else(|| match (self.equity_profit, self.debt_profit) {
            (None, None) => None,
            (e, d) => Some(e.unwrap_or(0.0) + d.unwrap_or(0.0)),
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn user(id: &str) -> UserRef {
        UserRef {
            id: id.to_string(),
            name: Some(format!("User {id}")),
            email: format!("{id}@example.com"),
            role: Role::Participant,
        }
    }

    pub fn forecast(id: &str, forecast_type: ForecastType) -> ForecastRef {
        ForecastRef {
            id: id.to_string(),
            organization_id: "org-1".to_string(),
            title: format!("Forecast {id}"),
            forecast_type,
            category: None,
            release_date: None,
            due_date: None,
            actual_value_set: true,
        }
    }

    pub fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).single().unwrap()
    }

    pub fn category(id: &str) -> CategoryRef {
        CategoryRef {
            id: id.to_string(),
            name: format!("Category {id}"),
            color: Some("#336699".to_string()),
        }
    }

    pub fn prediction(id: &str, user: UserRef, forecast: ForecastRef) -> PredictionRecord {
        PredictionRecord {
            id: id.to_string(),
            user,
            forecast,
            is_correct: None,
            continuous_outcome: None,
            confidence: None,
            equity_investment: None,
            debt_financing: None,
            total_investment: None,
            profit: None,
            equity_profit: None,
            debt_profit: None,
            roi: None,
            roe: None,
            rof: None,
            abs_error_pct_actual: None,
            abs_error_pct_forecast: None,
            estimated_time_minutes: None,
            profit_per_hour: None,
        }
    }

    pub fn binary(id: &str, user_id: &str, forecast_id: &str, correct: bool) -> PredictionRecord {
        let mut p = prediction(id, user(user_id), forecast(forecast_id, ForecastType::Binary));
        p.is_correct = Some(correct);
        p.confidence = Some(70.0);
        p
    }

    pub fn continuous(
        id: &str,
        user_id: &str,
        forecast_id: &str,
        outcome: ContinuousOutcome,
    ) -> PredictionRecord {
        let mut p = prediction(id, user(user_id), forecast(forecast_id, ForecastType::Continuous));
        p.continuous_outcome = Some(outcome);
        p
    }
}
