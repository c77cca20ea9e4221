//! Analytics client: runs the aggregation query once and memoizes the result.

use crate::cache::QueryCache;
use crate::engine::{QueryEngine, QueryError};
use crate::query::{AggregationQuery, normalize};
use crate::types::EventRow;
use chrono::NaiveDate;
use eyre::Result;
use std::sync::Arc;
use std::time::Duration;

/// Client bound to one project and one query engine.
///
/// Results are shared read-only via `Arc`, so several dashboards can hold the
/// same fetched rows while keeping their own filter state.
pub struct AnalyticsClient<E: QueryEngine> {
    project_id: String,
    engine: E,
    cache: QueryCache,
}

impl<E: QueryEngine> AnalyticsClient<E> {
    /// Create a client. The project id is passed through to the engine untouched.
    pub fn new(project_id: impl Into<String>, engine: E) -> Self {
        Self {
            project_id: project_id.into(),
            engine,
            cache: QueryCache::default(),
        }
    }

    /// Replace the cache with one using the given time-to-live.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = QueryCache::new(ttl);
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The query [`fetch`](Self::fetch) would run right now.
    pub fn query(&self) -> AggregationQuery {
        AggregationQuery::today(self.project_id.clone())
    }

    /// Fetch all rows through today (UTC).
    pub fn fetch(&mut self) -> Result<Arc<Vec<EventRow>>> {
        let through = self.query().through();
        self.fetch_through(through)
    }

    /// Fetch all rows with partitions on or before `through`.
    pub fn fetch_through(&mut self, through: NaiveDate) -> Result<Arc<Vec<EventRow>>> {
        if self.project_id.trim().is_empty() {
            return Err(eyre::eyre!(QueryError::Authentication(
                "no project id configured".to_string()
            )));
        }

        let query = AggregationQuery::new(self.project_id.clone(), through);
        let key = query.cache_key();

        if let Some(rows) = self.cache.get(&key) {
            log::debug!("Cache hit for query through {}", through);
            return Ok(rows);
        }

        log::debug!("Cache miss for query through {}", through);
        let result = self.engine.execute(&query)?;
        let rows = normalize(result)?;
        log::info!("Fetched {} row(s) through {}", rows.len(), through);

        Ok(self.cache.insert(key, rows))
    }

    /// Drop all memoized results so the next fetch re-queries.
    pub fn invalidate(&mut self) -> usize {
        let dropped = self.cache.invalidate();
        log::info!("Invalidated {} cached result(s)", dropped);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryEngine, ResultSet};
    use crate::types::RawEvent;
    use std::cell::Cell;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    /// Engine wrapper counting how often it is called.
    struct CountingEngine {
        inner: MemoryEngine,
        calls: Cell<usize>,
    }

    impl QueryEngine for CountingEngine {
        fn execute(&self, query: &AggregationQuery) -> Result<ResultSet> {
            self.calls.set(self.calls.get() + 1);
            self.inner.execute(query)
        }
    }

    fn counting_client() -> AnalyticsClient<CountingEngine> {
        let events = vec![
            RawEvent::new(day(1), "color_changed")
                .with_param("model", "ModelA")
                .with_param("variant", "V1")
                .with_param("color", "Red"),
        ];
        AnalyticsClient::new(
            "proj",
            CountingEngine {
                inner: MemoryEngine::new("proj", events),
                calls: Cell::new(0),
            },
        )
    }

    #[test]
    fn test_fetch_is_memoized() {
        let mut client = counting_client();

        let first = client.fetch_through(day(31)).unwrap();
        let second = client.fetch_through(day(31)).unwrap();

        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(client.engine().calls.get(), 1);
    }

    #[test]
    fn test_new_through_date_requeries() {
        let mut client = counting_client();

        client.fetch_through(day(30)).unwrap();
        client.fetch_through(day(31)).unwrap();

        assert_eq!(client.engine().calls.get(), 2);
    }

    #[test]
    fn test_invalidate_forces_requery() {
        let mut client = counting_client();

        client.fetch_through(day(31)).unwrap();
        assert_eq!(client.invalidate(), 1);
        client.fetch_through(day(31)).unwrap();

        assert_eq!(client.engine().calls.get(), 2);
    }

    #[test]
    fn test_empty_project_fails_before_engine() {
        let mut client = AnalyticsClient::new(
            "",
            CountingEngine {
                inner: MemoryEngine::new("proj", vec![]),
                calls: Cell::new(0),
            },
        );

        let err = client.fetch_through(day(1)).unwrap_err();
        assert!(err.downcast_ref::<QueryError>().unwrap().is_authentication());
        assert_eq!(client.engine().calls.get(), 0);
    }

    #[test]
    fn test_fetch_runs_query_through_today() {
        let mut client = counting_client();
        let query = client.query();
        assert_eq!(query.project_id(), "proj");

        client.fetch().unwrap();
        client.fetch_through(query.through()).unwrap();

        assert_eq!(client.engine().calls.get(), 1);
    }

    #[test]
    fn test_failed_fetch_is_not_cached() {
        let mut client = AnalyticsClient::new("other", MemoryEngine::new("proj", vec![]));
        assert!(client.fetch_through(day(1)).is_err());
        assert!(client.fetch_through(day(1)).is_err());
    }
}
