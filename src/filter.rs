//! Filter and recompute over fetched rows.
//!
//! Every function here is pure: the same rows and filter always give the same
//! output, and outputs only ever borrow from the input.

use crate::types::{ALL_MODELS_LABEL, EventRow, FilterState, ModelSelection, SeriesPoint};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Earliest and latest event date, or `None` for an empty set.
pub fn date_bounds(rows: &[EventRow]) -> Option<(NaiveDate, NaiveDate)> {
    let min = rows.iter().map(|r| r.event_date).min()?;
    let max = rows.iter().map(|r| r.event_date).max()?;
    Some((min, max))
}

/// Filter shown on first load: full date range, all models.
pub fn default_filter(rows: &[EventRow]) -> Option<FilterState> {
    date_bounds(rows).map(|(start, end)| FilterState::new(start, end, ModelSelection::All))
}

/// Entries of the model select input: the "All Models" label, then distinct models sorted.
pub fn model_options(rows: &[EventRow]) -> Vec<String> {
    let models: BTreeSet<&str> = rows.iter().map(|r| r.model_name.as_str()).collect();
    std::iter::once(ALL_MODELS_LABEL.to_string())
        .chain(models.into_iter().map(String::from))
        .collect()
}

/// Rows within the inclusive date range and matching the model selection.
///
/// Input order is preserved. An inverted range yields nothing.
pub fn filter_rows<'a>(rows: &'a [EventRow], filter: &FilterState) -> Vec<&'a EventRow> {
    if filter.start_date > filter.end_date {
        return Vec::new();
    }
    rows.iter().filter(|row| filter.matches(row)).collect()
}

/// One chart point per filtered row. Rows sharing a date stay separate points.
pub fn chart_series(rows: &[&EventRow]) -> Vec<SeriesPoint> {
    rows.iter()
        .map(|row| SeriesPoint {
            date: row.event_date,
            count: row.event_count,
        })
        .collect()
}
