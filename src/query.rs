//! The aggregation query contract.
//!
//! One query reduces the raw event log to [`EventRow`]s:
//!
//! 1. scan partitions dated on or before the "through" date (today by default)
//! 2. extract `model`, `variant` and the one dimension the event name carries
//! 3. drop events missing `model` or `variant`, or carrying no dimension
//! 4. group by `(date, model, variant, color, feature, accessory, pack)` and count
//! 5. sort ascending by the same key, nulls first
//!
//! [`AggregationQuery::sql`] renders the contract for the SQLite warehouse and
//! [`aggregate`] evaluates it in process; both must agree.

use crate::engine::{QueryError, ResultSet};
use crate::types::{Dimension, EventRow, PARTITION_FORMAT, RawEvent, RowKey};
use chrono::{NaiveDate, Utc};
use eyre::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Date format of the `event_dates` output column.
pub const OUTPUT_DATE_FORMAT: &str = "%d-%m-%Y";

/// Column list every engine must return, in order.
pub const EXPECTED_COLUMNS: [&str; 8] = [
    "event_dates",
    "distinct_model_names",
    "distinct_variant_names",
    "distinct_color_names",
    "distinct_feature_names",
    "distinct_accessory_names",
    "distinct_pack_names",
    "total_event_counts",
];

/// A single aggregation query bound to a project and an upper partition date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationQuery {
    project_id: String,
    through: NaiveDate,
}

impl AggregationQuery {
    pub fn new(project_id: impl Into<String>, through: NaiveDate) -> Self {
        Self {
            project_id: project_id.into(),
            through,
        }
    }

    /// Query everything up to and including the current UTC date.
    ///
    /// Partitions are written under UTC days, so the bound follows the
    /// warehouse clock rather than the local one.
    pub fn today(project_id: impl Into<String>) -> Self {
        Self::new(project_id, Utc::now().date_naive())
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Last partition date scanned (inclusive).
    pub fn through(&self) -> NaiveDate {
        self.through
    }

    /// Upper partition suffix bound, bound to `?1` in [`sql`](Self::sql).
    pub fn through_suffix(&self) -> String {
        self.through.format(PARTITION_FORMAT).to_string()
    }

    /// The query text in the warehouse's SQL dialect.
    pub fn sql(&self) -> String {
        let mut extracted = vec![
            format!("        {} AS model_name", param_select("model", None)),
            format!("        {} AS variant_name", param_select("variant", None)),
        ];
        for dim in Dimension::ALL {
            extracted.push(format!(
                "        {} AS {}",
                param_select(dim.param_key(), Some(dim.event_name())),
                dim.column()
            ));
        }

        let dim_columns: Vec<&str> = Dimension::ALL.iter().map(|d| d.column()).collect();
        let key_columns = format!("event_date, model_name, variant_name, {}", dim_columns.join(", "));
        let any_dimension = dim_columns
            .iter()
            .map(|c| format!("{} IS NOT NULL", c))
            .collect::<Vec<_>>()
            .join(" OR ");
        let outputs = Dimension::ALL
            .iter()
            .map(|d| format!("    {} AS {},", d.column(), d.output_column()))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"WITH filtered_events AS (
    SELECT id, event_date, event_name
    FROM events
    WHERE table_suffix <= ?1
),
extracted_values AS (
    SELECT
        f.event_date,
{extracted}
    FROM filtered_events f
),
aggregated_data AS (
    SELECT {key_columns}, COUNT(*) AS event_count
    FROM extracted_values
    WHERE model_name IS NOT NULL
        AND variant_name IS NOT NULL
        AND ({any_dimension})
    GROUP BY {key_columns}
)
SELECT
    substr(event_date, 7, 2) || '-' || substr(event_date, 5, 2) || '-' || substr(event_date, 1, 4) AS event_dates,
    model_name AS distinct_model_names,
    variant_name AS distinct_variant_names,
{outputs}
    event_count AS total_event_counts
FROM aggregated_data
ORDER BY {key_columns}"#,
            extracted = extracted.join(",\n"),
        )
    }

    /// Memoization key: SHA-256 over project, query text and bound parameters.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.project_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.sql().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.through_suffix().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Scalar subquery picking the first string value of `key`, optionally gated on the event name.
fn param_select(key: &str, gate: Option<&str>) -> String {
    let gate = gate
        .map(|name| format!(" AND f.event_name = '{}'", name))
        .unwrap_or_default();
    format!(
        "(SELECT p.string_value FROM event_params p WHERE p.event_id = f.id AND p.key = '{}'{} ORDER BY p.position LIMIT 1)",
        key, gate
    )
}

/// Evaluate the aggregation contract over raw events in process.
pub fn aggregate(events: &[RawEvent], through: NaiveDate) -> Vec<EventRow> {
    let mut groups: BTreeMap<RowKey, u64> = BTreeMap::new();

    for event in events.iter().filter(|e| e.event_date <= through) {
        let (Some(model), Some(variant)) = (event.param("model"), event.param("variant")) else {
            continue;
        };

        // The event name decides which single dimension may be read.
        let Some((dimension, value)) =
            Dimension::for_event(&event.event_name).and_then(|d| event.param(d.param_key()).map(|v| (d, v)))
        else {
            continue;
        };

        let pick = |d: Dimension| (d == dimension).then(|| value.to_string());
        let key = (
            event.event_date,
            model.to_string(),
            variant.to_string(),
            pick(Dimension::Color),
            pick(Dimension::Feature),
            pick(Dimension::Accessory),
            pick(Dimension::Pack),
        );
        *groups.entry(key).or_insert(0) += 1;
    }

    groups
        .into_iter()
        .map(
            |((event_date, model_name, variant_name, color_name, feature_name, accessory_name, pack_name), count)| {
                EventRow {
                    event_date,
                    model_name,
                    variant_name,
                    color_name,
                    feature_name,
                    accessory_name,
                    pack_name,
                    event_count: count,
                }
            },
        )
        .collect()
}

/// Convert engine output into [`EventRow`]s, rejecting schema drift.
pub fn normalize(result: ResultSet) -> Result<Vec<EventRow>> {
    if result.columns.len() != EXPECTED_COLUMNS.len()
        || result.columns.iter().zip(EXPECTED_COLUMNS).any(|(a, b)| a != b)
    {
        return Err(eyre::eyre!(QueryError::Execution(format!(
            "schema mismatch: expected columns [{}], got [{}]",
            EXPECTED_COLUMNS.join(", "),
            result.columns.join(", ")
        ))));
    }

    let mut rows = Vec::with_capacity(result.rows.len());
    for (index, raw) in result.rows.into_iter().enumerate() {
        let event_date = NaiveDate::parse_from_str(&raw.event_dates, OUTPUT_DATE_FORMAT).map_err(|e| {
            eyre::eyre!(QueryError::Execution(format!(
                "row {}: invalid event_dates '{}': {}",
                index, raw.event_dates, e
            )))
        })?;

        let (Some(model_name), Some(variant_name)) = (raw.distinct_model_names, raw.distinct_variant_names) else {
            return Err(eyre::eyre!(QueryError::Execution(format!(
                "row {}: null model or variant name",
                index
            ))));
        };

        let event_count = u64::try_from(raw.total_event_counts).map_err(|_| {
            eyre::eyre!(QueryError::Execution(format!(
                "row {}: negative event count {}",
                index, raw.total_event_counts
            )))
        })?;

        let row = EventRow {
            event_date,
            model_name,
            variant_name,
            color_name: raw.distinct_color_names,
            feature_name: raw.distinct_feature_names,
            accessory_name: raw.distinct_accessory_names,
            pack_name: raw.distinct_pack_names,
            event_count,
        };
        if row.dimension().is_none() {
            log::warn!("row {} carries no dimension: {:?}", index, row.key());
        }
        rows.push(row);
    }

    Ok(rows)
}
