use crate::errors::{LeaderboardError, LeaderboardResult};
use std::path::PathBuf;

/// Default starting balance every participant's fund is credited with.
pub const DEFAULT_STARTING_FUND_BALANCE: f64 = 250_000.0;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub server_port: u16,
    pub starting_fund_balance: f64,
    pub default_result_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> LeaderboardResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| LeaderboardError::Config(format!("SERVER_PORT: {e}")))?;

        let starting_fund_balance = env_var_or("STARTING_FUND_BALANCE", "250000")
            .parse::<f64>()
            .map_err(|e| LeaderboardError::Config(format!("STARTING_FUND_BALANCE: {e}")))?;
        if !starting_fund_balance.is_finite() {
            return Err(LeaderboardError::Config(
                "STARTING_FUND_BALANCE must be finite".into(),
            ));
        }

        let default_result_limit = env_var_or("DEFAULT_RESULT_LIMIT", "500")
            .parse::<usize>()
            .map_err(|e| LeaderboardError::Config(format!("DEFAULT_RESULT_LIMIT: {e}")))?;

        Ok(Self {
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            server_port,
            starting_fund_balance,
            default_result_limit,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            server_port: 3001,
            starting_fund_balance: DEFAULT_STARTING_FUND_BALANCE,
            default_result_limit: 500,
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
