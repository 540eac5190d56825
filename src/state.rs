use crate::config::AppConfig;
use crate::source::RowSource;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ── Request counters (lock-free) ──

pub struct PerfCounters {
    pub leaderboards_served: AtomicU64,
    pub rows_aggregated: AtomicU64,
    pub filters_rejected: AtomicU64,
    pub fetch_errors: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            leaderboards_served: AtomicU64::new(0),
            rows_aggregated: AtomicU64::new(0),
            filters_rejected: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_served(&self, rows: usize) {
        self.leaderboards_served.fetch_add(1, Ordering::Relaxed);
        self.rows_aggregated.fetch_add(rows as u64, Ordering::Relaxed);
    }
}

// ── Application shared state ──

/// Shared by every HTTP handler. Holds no aggregate state: each request
/// recomputes from the row source.
pub struct AppState {
    pub config: AppConfig,
    pub source: Arc<dyn RowSource>,
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig, source: Arc<dyn RowSource>) -> Arc<Self> {
        Arc::new(Self {
            config,
            source,
            counters: PerfCounters::new(),
        })
    }
}
