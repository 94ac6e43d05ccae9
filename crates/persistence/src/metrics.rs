//! Database metrics collection.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Record how long a query took and whether it succeeded.
pub fn record_query_duration(query_name: &'static str, outcome: &'static str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name,
        "outcome" => outcome
    )
    .record(duration_secs);

    if outcome == "error" {
        counter!("database_query_errors_total", "query" => query_name).increment(1);
    }
}

/// Record connection pool gauges. Called from the health endpoints.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("database_connections_active").set(size.saturating_sub(idle) as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_total").set(size as f64);
}

/// Times one repository operation.
///
/// ```ignore
/// let timer = QueryTimer::new("find_user_by_email");
/// let result = sqlx::query_as::<_, UserEntity>(...).fetch_optional(&pool).await;
/// timer.finish(&result);
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    /// Record the elapsed time with the outcome of `result`.
    pub fn finish<T, E>(self, result: &Result<T, E>) {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        record_query_duration(self.query_name, outcome, self.start.elapsed().as_secs_f64());
    }

    /// Record the elapsed time of an operation that completed.
    pub fn record(self) {
        record_query_duration(self.query_name, "ok", self.start.elapsed().as_secs_f64());
    }
}
