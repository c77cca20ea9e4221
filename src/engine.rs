//! The query-engine seam: the black box that evaluates an aggregation query.

use crate::query::{AggregationQuery, EXPECTED_COLUMNS, OUTPUT_DATE_FORMAT, aggregate};
use crate::types::RawEvent;
use eyre::Result;

/// Errors raised by a query engine. Both are terminal for the fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Missing, invalid or unauthorized project credentials.
    Authentication(String),
    /// Engine unreachable, query failure or schema mismatch.
    Execution(String),
}

impl QueryError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, QueryError::Authentication(_))
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Authentication(msg) => write!(f, "authentication failed: {}", msg),
            QueryError::Execution(msg) => write!(f, "query execution failed: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}

/// One row as returned by the engine, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// `DD-MM-YYYY`
    pub event_dates: String,
    pub distinct_model_names: Option<String>,
    pub distinct_variant_names: Option<String>,
    pub distinct_color_names: Option<String>,
    pub distinct_feature_names: Option<String>,
    pub distinct_accessory_names: Option<String>,
    pub distinct_pack_names: Option<String>,
    pub total_event_counts: i64,
}

/// Tabular engine output: column names plus rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
}

impl ResultSet {
    /// An empty result carrying the expected column list.
    pub fn empty() -> Self {
        Self {
            columns: EXPECTED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

/// Something that can evaluate an [`AggregationQuery`].
///
/// Failures are reported as `eyre` errors wrapping a [`QueryError`].
pub trait QueryEngine {
    fn execute(&self, query: &AggregationQuery) -> Result<ResultSet>;
}

impl<E: QueryEngine + ?Sized> QueryEngine for &E {
    fn execute(&self, query: &AggregationQuery) -> Result<ResultSet> {
        (**self).execute(query)
    }
}

impl<E: QueryEngine + ?Sized> QueryEngine for Box<E> {
    fn execute(&self, query: &AggregationQuery) -> Result<ResultSet> {
        (**self).execute(query)
    }
}

/// Reject queries whose project id does not match the one the engine serves.
pub(crate) fn authorize(expected: &str, query: &AggregationQuery) -> Result<()> {
    let project = query.project_id().trim();
    if project.is_empty() {
        return Err(eyre::eyre!(QueryError::Authentication(
            "no project id configured".to_string()
        )));
    }
    if project != expected {
        return Err(eyre::eyre!(QueryError::Authentication(format!(
            "project '{}' is not authorized for this warehouse",
            project
        ))));
    }
    Ok(())
}

/// In-process engine evaluating the query over a list of raw events.
pub struct MemoryEngine {
    project_id: String,
    events: Vec<RawEvent>,
}

impl MemoryEngine {
    pub fn new(project_id: impl Into<String>, events: Vec<RawEvent>) -> Self {
        Self {
            project_id: project_id.into(),
            events,
        }
    }
}

impl QueryEngine for MemoryEngine {
    fn execute(&self, query: &AggregationQuery) -> Result<ResultSet> {
        authorize(&self.project_id, query)?;

        let rows = aggregate(&self.events, query.through())
            .into_iter()
            .map(|row| ResultRow {
                event_dates: row.event_date.format(OUTPUT_DATE_FORMAT).to_string(),
                distinct_model_names: Some(row.model_name),
                distinct_variant_names: Some(row.variant_name),
                distinct_color_names: row.color_name,
                distinct_feature_names: row.feature_name,
                distinct_accessory_names: row.accessory_name,
                distinct_pack_names: row.pack_name,
                total_event_counts: row.event_count as i64,
            })
            .collect();

        Ok(ResultSet {
            rows,
            ..ResultSet::empty()
        })
    }
}
