use axum::response::IntoResponse;

/// Error taxonomy for the leaderboard service.
/// The aggregation core only fails on invalid parameters; everything else
/// originates in the row-fetching layer and is propagated unchanged.
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for LeaderboardError {
    fn from(e: rusqlite::Error) -> Self {
        LeaderboardError::Database(e.to_string())
    }
}

impl From<std::io::Error> for LeaderboardError {
    fn from(e: std::io::Error) -> Self {
        LeaderboardError::Database(format!("io: {e}"))
    }
}

pub type LeaderboardResult<T> = Result<T, LeaderboardError>;

impl IntoResponse for LeaderboardError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            LeaderboardError::InvalidFilter(_) => axum::http::StatusCode::BAD_REQUEST,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, axum::Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
