//! Dashboard session: fetched rows plus the user's filter state.

use crate::filter::{chart_series, default_filter, filter_rows, model_options};
use crate::types::{EventRow, FilterState, ModelSelection, SeriesPoint};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

pub const DASHBOARD_TITLE: &str = "Analytics Dashboard";
pub const CHART_TITLE: &str = "User Interactions Over Time";
pub const TABLE_TITLE: &str = "Raw Data";

/// A user-input event that changes the filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterInput {
    StartDate(NaiveDate),
    EndDate(NaiveDate),
    Model(ModelSelection),
    /// Restore the first-load defaults
    Reset,
}

/// Everything needed to render the page once.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardView {
    pub title: String,
    /// `None` when there is no data to describe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub filter: Option<FilterState>,
    pub model_options: Vec<String>,
    pub chart_title: String,
    pub series: Vec<SeriesPoint>,
    pub table_title: String,
    pub rows: Vec<EventRow>,
}

impl DashboardView {
    /// True when there is nothing to chart or tabulate.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One user's session over a shared, immutable row set.
pub struct Dashboard {
    rows: Arc<Vec<EventRow>>,
    filter: Option<FilterState>,
}

impl Dashboard {
    /// Start a session with the default filter. An empty row set has no filter.
    pub fn new(rows: Arc<Vec<EventRow>>) -> Self {
        let filter = default_filter(&rows);
        Self { rows, filter }
    }

    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    pub fn filter(&self) -> Option<&FilterState> {
        self.filter.as_ref()
    }

    /// Apply a user-input event. Inputs on an empty dashboard are ignored.
    pub fn apply(&mut self, input: FilterInput) {
        if let FilterInput::Reset = input {
            self.filter = default_filter(&self.rows);
            return;
        }

        let Some(filter) = self.filter.as_mut() else {
            log::debug!("Ignoring {:?}: no data loaded", input);
            return;
        };

        match input {
            FilterInput::StartDate(date) => filter.start_date = date,
            FilterInput::EndDate(date) => filter.end_date = date,
            FilterInput::Model(selection) => filter.selected_model = selection,
            FilterInput::Reset => {}
        }
    }

    /// Swap in freshly fetched rows, restoring the default filter.
    pub fn replace_rows(&mut self, rows: Arc<Vec<EventRow>>) {
        self.filter = default_filter(&rows);
        self.rows = rows;
    }

    /// Rows passing the current filter.
    pub fn filtered_rows(&self) -> Vec<&EventRow> {
        match &self.filter {
            Some(filter) => filter_rows(&self.rows, filter),
            None => Vec::new(),
        }
    }

    /// Chart series for the current filter.
    pub fn series(&self) -> Vec<SeriesPoint> {
        chart_series(&self.filtered_rows())
    }

    /// Compute the full view for the current filter.
    pub fn view(&self) -> DashboardView {
        let filtered = self.filtered_rows();

        DashboardView {
            title: DASHBOARD_TITLE.to_string(),
            subtitle: self
                .filter
                .as_ref()
                .map(|f| format!("Data from {} to {}", f.start_date, f.end_date)),
            filter: self.filter.clone(),
            model_options: model_options(&self.rows),
            chart_title: CHART_TITLE.to_string(),
            series: chart_series(&filtered),
            table_title: TABLE_TITLE.to_string(),
            rows: filtered.into_iter().cloned().collect(),
        }
    }
}
