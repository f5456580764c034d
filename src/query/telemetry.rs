use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default slow-query threshold.
pub const SLOW_QUERY_MS: u64 = 100;

pub const SLOW_QUERY_WARNING: &str = "slow query";

pub const QUERY_LOG_TARGET: &str = "docquery::query";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let slow = std::env::var("DOCQUERY_SLOW_QUERY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(SLOW_QUERY_MS);
        Self { slow_query_ms: slow }
    }
}

/// One record per terminal call, bracketing the store round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatus {
    pub raw_query: String,
    pub err: Option<String>,
    pub slow: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QueryStatus {
    #[must_use]
    pub fn new(raw_query: String, err: Option<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { raw_query, err, slow: false, start, end }
    }

    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    /// Stable hash of the rendered query, for grouping identical query shapes in logs.
    #[must_use]
    pub fn query_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut h = Sha256::new();
        h.update(self.raw_query.as_bytes());
        let mut out = hex::encode(h.finalize());
        out.truncate(16);
        out
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} took={}ms hash={}", self.raw_query, self.duration_ms(), self.query_hash())?;
        if let Some(err) = &self.err {
            write!(f, " err={err:?}")?;
        }
        if self.slow {
            write!(f, " slow=true")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Warn,
}

/// Marks calls at or above the threshold as slow. A missing error is filled with the
/// slow-query warning; a real error is kept as is.
pub fn classify(status: &mut QueryStatus, slow_query_ms: u64) -> Severity {
    status.slow = u64::try_from(status.duration_ms()).is_ok_and(|ms| ms >= slow_query_ms);
    if status.slow && status.err.is_none() {
        status.err = Some(SLOW_QUERY_WARNING.to_string());
    }
    if status.err.is_some() { Severity::Warn } else { Severity::Debug }
}

/// Sink for query records.
pub trait QueryLogger: Send + Sync {
    fn debug(&self, status: &QueryStatus);
    fn warn(&self, status: &QueryStatus);
}

/// Forwards query records to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogQueryLogger;

impl QueryLogger for LogQueryLogger {
    fn debug(&self, status: &QueryStatus) {
        log::debug!(target: QUERY_LOG_TARGET, "{status}");
    }

    fn warn(&self, status: &QueryStatus) {
        log::warn!(target: QUERY_LOG_TARGET, "{status}");
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub queries_failed_total: AtomicU64,
}

pub(crate) static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::default);

pub fn log_query(logger: &dyn QueryLogger, cfg: &TelemetryConfig, mut status: QueryStatus) {
    METRICS.queries_total.fetch_add(1, Ordering::Relaxed);
    if status.err.is_some() {
        METRICS.queries_failed_total.fetch_add(1, Ordering::Relaxed);
    }
    match classify(&mut status, cfg.slow_query_ms) {
        Severity::Warn => {
            if status.slow {
                METRICS.queries_slow_total.fetch_add(1, Ordering::Relaxed);
            }
            logger.warn(&status);
        }
        Severity::Debug => logger.debug(&status),
    }
}

#[must_use]
pub fn metrics_text() -> String {
    // Prometheus text exposition, counters only
    let m = &*METRICS;
    format!(
        "docquery_queries_total {}\n\
         docquery_queries_slow_total {}\n\
         docquery_queries_failed_total {}\n",
        m.queries_total.load(Ordering::Relaxed),
        m.queries_slow_total.load(Ordering::Relaxed),
        m.queries_failed_total.load(Ordering::Relaxed),
    )
}
