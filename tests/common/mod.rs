//! Shared test infrastructure for Eventboard integration tests.
//!
//! Provides TestEnv helper for consistent warehouse setup/teardown.

#![allow(dead_code)]

use chrono::NaiveDate;
use eventboard::{AnalyticsClient, EventRow, RawEvent, Warehouse};
use tempfile::TempDir;

pub const PROJECT: &str = "test-project";

/// Build a date in January 2024.
pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).expect("Invalid test date")
}

/// Build an aggregated row carrying one dimension in the color column.
pub fn color_row(d: u32, model: &str, color: &str, count: u64) -> EventRow {
    EventRow {
        event_date: day(d),
        model_name: model.to_string(),
        variant_name: "V1".to_string(),
        color_name: Some(color.to_string()),
        feature_name: None,
        accessory_name: None,
        pack_name: None,
        event_count: count,
    }
}

/// Build an aggregated row carrying one dimension in the feature column.
pub fn feature_row(d: u32, model: &str, feature: &str, count: u64) -> EventRow {
    EventRow {
        color_name: None,
        feature_name: Some(feature.to_string()),
        ..color_row(d, model, "", count)
    }
}

/// Build a raw event with model and variant set.
pub fn raw_event(d: u32, name: &str, model: &str, variant: &str) -> RawEvent {
    RawEvent::new(day(d), name)
        .with_param("model", model)
        .with_param("variant", variant)
}

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub warehouse: Warehouse,
}

impl TestEnv {
    /// Create a new environment with an initialized warehouse.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let warehouse = Warehouse::init(temp_dir.path(), PROJECT).expect("Failed to init warehouse");
        Self { temp_dir, warehouse }
    }

    /// Store events.
    pub fn insert(&mut self, events: &[RawEvent]) {
        self.warehouse.insert_events(events).expect("Failed to insert events");
    }

    /// Open a second handle and wrap it in a client for `project`.
    pub fn client(&self, project: &str) -> AnalyticsClient<Warehouse> {
        let warehouse = Warehouse::open(self.temp_dir.path()).expect("Failed to open warehouse");
        AnalyticsClient::new(project, warehouse)
    }

    /// Fetch through the end of January 2024.
    pub fn fetch(&self) -> Vec<EventRow> {
        self.client(PROJECT)
            .fetch_through(day(31))
            .expect("Failed to fetch")
            .to_vec()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
