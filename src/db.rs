use crate::domain::filter::{FilterSpec, Scope};
use crate::domain::{
    CategoryRef, ContinuousOutcome, ForecastRef, ForecastType, PredictionRecord, Role, UserRef,
    MAX_EQUITY_INVESTMENT,
};
use crate::errors::{LeaderboardError, LeaderboardResult};
use crate::source::{self, RowSource};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type DbPool = Arc<Mutex<Connection>>;

const SCHEMA: &str = include_str!("../migrations/001_init.sql");

pub fn init_db(data_dir: &Path) -> LeaderboardResult<DbPool> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("forecast_leaderboard.db");
    let conn = Connection::open(&db_path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
    conn.execute_batch(SCHEMA)?;

    tracing::info!("database initialized at {}", db_path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

/// Fresh database with the schema applied and nothing else.
pub fn open_in_memory() -> LeaderboardResult<DbPool> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    conn.execute_batch(SCHEMA)?;
    Ok(Arc::new(Mutex::new(conn)))
}

// ── Qualifying-row query ──

const QUALIFYING_ROWS: &str = "
    SELECT p.id,
           u.id, u.name, u.email, u.role,
           f.id, f.organization_id, f.title, f.type, f.release_date, f.due_date,
           c.id, c.name, c.color,
           p.is_correct, p.continuous_outcome, p.confidence,
           p.equity_investment, p.debt_financing, p.total_investment,
           p.profit, p.equity_profit, p.debt_profit,
           p.roi, p.roe, p.rof,
           p.abs_error_pct_actual, p.abs_error_pct_forecast,
           p.estimated_time_minutes, p.profit_per_hour
    FROM predictions p
    JOIN users u ON u.id = p.user_id
    JOIN forecasts f ON f.id = p.forecast_id
    LEFT JOIN categories c ON c.id = f.category_id
    WHERE f.actual_value IS NOT NULL
      AND u.role = 'USER'";

/// Scope predicate and its bound parameters.
fn scope_clause(scope: &Scope) -> (&'static str, Vec<String>) {
    match scope {
        Scope::Organization { organization_id } => {
            (" AND f.organization_id = ?1", vec![organization_id.clone()])
        }
        Scope::User { organization_id, user_id } => (
            " AND f.organization_id = ?1 AND u.id = ?2",
            vec![organization_id.clone(), user_id.clone()],
        ),
        Scope::Forecast { forecast_id } => (" AND f.id = ?1", vec![forecast_id.clone()]),
        Scope::Category { category_id } => (" AND f.category_id = ?1", vec![category_id.clone()]),
    }
}

/// Column values as stored, before enum text is parsed.
struct RawRow {
    id: String,
    user_id: String,
    user_name: Option<String>,
    user_email: String,
    user_role: String,
    forecast_id: String,
    organization_id: String,
    title: String,
    forecast_type: String,
    release_date: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    category_id: Option<String>,
    category_name: Option<String>,
    category_color: Option<String>,
    is_correct: Option<bool>,
    continuous_outcome: Option<String>,
    confidence: Option<f64>,
    equity_investment: Option<i64>,
    debt_financing: Option<f64>,
    total_investment: Option<f64>,
    profit: Option<f64>,
    equity_profit: Option<f64>,
    debt_profit: Option<f64>,
    roi: Option<f64>,
    roe: Option<f64>,
    rof: Option<f64>,
    abs_error_pct_actual: Option<f64>,
    abs_error_pct_forecast: Option<f64>,
    estimated_time_minutes: Option<f64>,
    profit_per_hour: Option<f64>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            user_name: row.get(2)?,
            user_email: row.get(3)?,
            user_role: row.get(4)?,
            forecast_id: row.get(5)?,
            organization_id: row.get(6)?,
            title: row.get(7)?,
            forecast_type: row.get(8)?,
            release_date: row.get(9)?,
            due_date: row.get(10)?,
            category_id: row.get(11)?,
            category_name: row.get(12)?,
            category_color: row.get(13)?,
            is_correct: row.get(14)?,
            continuous_outcome: row.get(15)?,
            confidence: row.get(16)?,
            equity_investment: row.get(17)?,
            debt_financing: row.get(18)?,
            total_investment: row.get(19)?,
            profit: row.get(20)?,
            equity_profit: row.get(21)?,
            debt_profit: row.get(22)?,
            roi: row.get(23)?,
            roe: row.get(24)?,
            rof: row.get(25)?,
            abs_error_pct_actual: row.get(26)?,
            abs_error_pct_forecast: row.get(27)?,
            estimated_time_minutes: row.get(28)?,
            profit_per_hour: row.get(29)?,
        })
    }

    fn into_record(self) -> LeaderboardResult<PredictionRecord> {
        if let Some(e) = self.equity_investment.filter(|e| !(0..=MAX_EQUITY_INVESTMENT).contains(e)) {
            return Err(LeaderboardError::Parse(format!(
                "prediction {}: equity investment {e} out of range",
                self.id
            )));
        }
        let category = match (self.category_id, self.category_name) {
            (Some(id), Some(name)) => Some(CategoryRef { id, name, color: self.category_color }),
            _ => None,
        };
        Ok(PredictionRecord {
            id: self.id,
            user: UserRef {
                id: self.user_id,
                name: self.user_name,
                email: self.user_email,
                role: Role::parse(&self.user_role)?,
            },
            forecast: ForecastRef {
                id: self.forecast_id,
                organization_id: self.organization_id,
                title: self.title,
                forecast_type: ForecastType::parse(&self.forecast_type)?,
                category,
                release_date: self.release_date,
                due_date: self.due_date,
                // Guaranteed by the WHERE clause.
                actual_value_set: true,
            },
            is_correct: self.is_correct,
            continuous_outcome: self.continuous_outcome.as_deref().map(ContinuousOutcome::parse).transpose()?,
            confidence: self.confidence,
            equity_investment: self.equity_investment,
            debt_financing: self.debt_financing,
            total_investment: self.total_investment,
            profit: self.profit,
            equity_profit: self.equity_profit,
            debt_profit: self.debt_profit,
            roi: self.roi,
            roe: self.roe,
            rof: self.rof,
            abs_error_pct_actual: self.abs_error_pct_actual,
            abs_error_pct_forecast: self.abs_error_pct_forecast,
            estimated_time_minutes: self.estimated_time_minutes,
            profit_per_hour: self.profit_per_hour,
        })
    }
}

pub fn fetch_qualifying_rows(conn: &Connection, scope: &Scope) -> LeaderboardResult<Vec<PredictionRecord>> {
    let (clause, params) = scope_clause(scope);
    let sql = format!("{QUALIFYING_ROWS}{clause} ORDER BY p.id");
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), RawRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter().map(RawRow::into_record).collect()
}

// ── Scope forecast catalog ──

const RESOLVED_FORECASTS: &str = "
    SELECT f.id, f.organization_id, f.title, f.type, f.release_date, f.due_date,
           c.id, c.name, c.color
    FROM forecasts f
    LEFT JOIN categories c ON c.id = f.category_id
    WHERE f.actual_value IS NOT NULL";

/// Forecast-level scope predicate. A user scope covers its whole organization.
fn forecast_scope_clause(scope: &Scope) -> (&'static str, Vec<String>) {
    match scope {
        Scope::Organization { organization_id } | Scope::User { organization_id, .. } => {
            (" AND f.organization_id = ?1", vec![organization_id.clone()])
        }
        Scope::Forecast { forecast_id } => (" AND f.id = ?1", vec![forecast_id.clone()]),
        Scope::Category { category_id } => (" AND f.category_id = ?1", vec![category_id.clone()]),
    }
}

/// Resolved forecasts the scope covers, whether or not anyone predicted on them.
pub fn fetch_scope_forecasts(conn: &Connection, scope: &Scope) -> LeaderboardResult<Vec<ForecastRef>> {
    let (clause, params) = forecast_scope_clause(scope);
    let sql = format!("{RESOLVED_FORECASTS}{clause} ORDER BY f.id");
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<DateTime<Utc>>>(4)?,
                row.get::<_, Option<DateTime<Utc>>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, organization_id, title, kind, release_date, due_date, cat_id, cat_name, color)| -> LeaderboardResult<ForecastRef> {
            let category = match (cat_id, cat_name) {
                (Some(id), Some(name)) => Some(CategoryRef { id, name, color }),
                _ => None,
            };
            Ok(ForecastRef {
                id,
                organization_id,
                title,
                forecast_type: ForecastType::parse(&kind)?,
                category,
                release_date,
                due_date,
                actual_value_set: true,
            })
        })
        .collect()
}

// ── RowSource over SQLite ──

/// Qualifying gate and scope run in SQL; filters run through the shared
/// in-process routine so every adapter yields the same rows. Recent-N
/// draws from the forecasts table, so forecasts nobody has predicted on
/// yet still take a slot.
#[derive(Clone)]
pub struct SqliteSource {
    db: DbPool,
}

impl SqliteSource {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl RowSource for SqliteSource {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn fetch_qualifying_rows(
        &self,
        scope: &Scope,
        filters: &FilterSpec,
    ) -> LeaderboardResult<Vec<PredictionRecord>> {
        let conn = self.db.lock().map_err(|e| LeaderboardError::Database(format!("lock poisoned: {e}")))?;
        let rows = fetch_qualifying_rows(&conn, scope)?;
        let forecasts = match filters.recent_forecasts() {
            Some(_) => fetch_scope_forecasts(&conn, scope)?,
            None => Vec::new(),
        };
        Ok(source::apply_filters(rows, filters, &forecasts))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::FilterParams;

    fn seeded() -> SqliteSource {
        let db = open_in_memory().unwrap();
        seed::sample(&db.lock().unwrap());
        SqliteSource::new(db)
    }

    fn ids(rows: &[PredictionRecord]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_org_scope_applies_qualifying_gate() {
        let source = seeded();
        let scope = Scope::Organization { organization_id: "org-1".into() };
        let rows = source.fetch_qualifying_rows(&scope, &FilterSpec::default()).unwrap();
        // p3 is an admin's, p4 is on an unresolved forecast, p5 is another org's.
        assert_eq!(ids(&rows), vec!["p1", "p2", "p6", "p7"]);
    }

    #[test]
    fn test_rows_decode_all_columns() {
        let source = seeded();
        let scope = Scope::Forecast { forecast_id: "f-cont".into() };
        let rows = source.fetch_qualifying_rows(&scope, &FilterSpec::default()).unwrap();
        let p6 = rows.iter().find(|r| r.id == "p6").unwrap();
        assert_eq!(p6.forecast.forecast_type, ForecastType::Continuous);
        assert_eq!(p6.continuous_outcome, Some(ContinuousOutcome::High));
        assert_eq!(p6.abs_error_pct_actual, Some(10.0));
        assert_eq!(p6.forecast.category.as_ref().map(|c| c.id.as_str()), Some("c1"));
        assert_eq!(p6.forecast.release_date, Some(crate::domain::fixtures::day(2)));
        assert_eq!(p6.user.role, Role::Participant);
        assert!(p6.forecast.actual_value_set);
    }

    #[test]
    fn test_user_and_category_scopes() {
        let source = seeded();
        let user = Scope::User { organization_id: "org-1".into(), user_id: "u2".into() };
        let rows = source.fetch_qualifying_rows(&user, &FilterSpec::default()).unwrap();
        assert_eq!(ids(&rows), vec!["p2", "p7"]);

        let category = Scope::Category { category_id: "c1".into() };
        let rows = source.fetch_qualifying_rows(&category, &FilterSpec::default()).unwrap();
        assert_eq!(ids(&rows), vec!["p6", "p7"]);

        let wrong_org = Scope::User { organization_id: "org-2".into(), user_id: "u2".into() };
        assert!(source.fetch_qualifying_rows(&wrong_org, &FilterSpec::default()).unwrap().is_empty());
    }

    #[test]
    fn test_filters_match_in_memory_source() {
        let db = open_in_memory().unwrap();
        seed::sample(&db.lock().unwrap());
        let scope = Scope::Organization { organization_id: "org-1".into() };
        let everything = {
            let conn = db.lock().unwrap();
            fetch_qualifying_rows(&conn, &scope).unwrap()
        };
        let memory = source::InMemorySource::new(everything);
        let sqlite = SqliteSource::new(db);

        let spec = FilterSpec::validate(FilterParams {
            forecast_types: vec![ForecastType::Binary],
            recent_forecasts: Some(1),
            ..Default::default()
        })
        .unwrap();
        let a = sqlite.fetch_qualifying_rows(&scope, &spec).unwrap();
        let b = memory.fetch_qualifying_rows(&scope, &spec).unwrap();
        assert_eq!(a, b);
        assert_eq!(ids(&a), vec!["p1", "p2"]);
    }

    #[test]
    fn test_init_db_reports_unusable_data_dir() {
        let blocker = std::env::temp_dir().join(format!("forecast_leaderboard_blocker_{}", std::process::id()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        let err = init_db(&blocker.join("data")).unwrap_err();
        std::fs::remove_file(&blocker).unwrap();
        assert!(matches!(err, LeaderboardError::Database(_)), "got {err}");
        assert!(err.to_string().contains("io:"), "got {err}");
    }

    #[test]
    fn test_bad_enum_text_is_parse_error() {
        let db = open_in_memory().unwrap();
        {
            let conn = db.lock().unwrap();
            seed::sample(&conn);
            conn.execute_batch("PRAGMA ignore_check_constraints=ON;").unwrap();
            conn.execute("UPDATE predictions SET continuous_outcome = 'SIDEWAYS' WHERE id = 'p6'", []).unwrap();
        }
        let source = SqliteSource::new(db);
        let scope = Scope::Organization { organization_id: "org-1".into() };
        let err = source.fetch_qualifying_rows(&scope, &FilterSpec::default()).unwrap_err();
        assert!(matches!(err, LeaderboardError::Parse(_)), "got {err}");
    }

    #[test]
    fn test_out_of_range_equity_is_parse_error() {
        let db = open_in_memory().unwrap();
        {
            let conn = db.lock().unwrap();
            seed::sample(&conn);
            conn.execute_batch("PRAGMA ignore_check_constraints=ON;").unwrap();
            conn.execute("UPDATE predictions SET equity_investment = 20000001 WHERE id = 'p1'", []).unwrap();
        }
        let source = SqliteSource::new(db);
        let scope = Scope::Forecast { forecast_id: "f-bin".into() };
        let err = source.fetch_qualifying_rows(&scope, &FilterSpec::default()).unwrap_err();
        assert!(err.to_string().contains("out of range"), "got {err}");
    }

    #[test]
    fn test_recent_uses_scope_forecasts_not_user_rows() {
        let db = open_in_memory().unwrap();
        {
            let conn = db.lock().unwrap();
            seed::sample(&conn);
            // Newer than f-cont, predicted on only by the admin.
            seed::forecast(&conn, "org-1", "f-admin", ForecastType::Binary, None, Some(4), Some("true"));
            seed::binary(&conn, "p8", "boss", "f-admin", true, 1_000, 10.0);
        }
        let source = SqliteSource::new(db);
        let spec = FilterSpec::validate(FilterParams { recent_forecasts: Some(2), ..Default::default() }).unwrap();

        let org = Scope::Organization { organization_id: "org-1".into() };
        assert_eq!(ids(&source.fetch_qualifying_rows(&org, &spec).unwrap()), vec!["p6", "p7"]);

        // u1's own latest two would be f-cont and f-bin; the org's are f-admin and f-cont.
        let user = Scope::User { organization_id: "org-1".into(), user_id: "u1".into() };
        assert_eq!(ids(&source.fetch_qualifying_rows(&user, &spec).unwrap()), vec!["p6"]);
    }

    #[test]
    fn test_scope_forecasts_skip_unresolved_and_other_orgs() {
        let db = open_in_memory().unwrap();
        seed::sample(&db.lock().unwrap());
        let conn = db.lock().unwrap();
        let user = Scope::User { organization_id: "org-1".into(), user_id: "u2".into() };
        let forecasts = fetch_scope_forecasts(&conn, &user).unwrap();
        let ids: Vec<&str> = forecasts.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f-bin", "f-cont"]);
        assert_eq!(forecasts[1].category.as_ref().map(|c| c.id.as_str()), Some("c1"));
    }
}
