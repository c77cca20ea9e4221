//! Eventboard: a single-page analytics dashboard over an event-log warehouse.
//!
//! One aggregation query reduces raw interaction events to per-day counts by
//! model, variant and dimension. The fetched rows are then filtered by date
//! range and model without re-querying.
//!
//! # Example
//!
//! ```no_run
//! use eventboard::{AnalyticsClient, Dashboard, FilterInput, ModelSelection, Warehouse};
//! use std::path::Path;
//!
//! let warehouse = Warehouse::open(Path::new(".eventboard")).unwrap();
//! let mut client = AnalyticsClient::new("my-project", warehouse);
//!
//! // Runs the query once; later fetches today hit the cache
//! let rows = client.fetch().unwrap();
//!
//! let mut dashboard = Dashboard::new(rows);
//! dashboard.apply(FilterInput::Model(ModelSelection::from_input("Aurora")));
//!
//! let view = dashboard.view();
//! for point in &view.series {
//!     println!("{} {}", point.date, point.count);
//! }
//! ```

mod types;

pub mod cache;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod filter;
pub mod query;
pub mod sample;
pub mod warehouse;

// Re-export public API
pub use cache::QueryCache;
pub use client::AnalyticsClient;
pub use config::Config;
pub use dashboard::{Dashboard, DashboardView, FilterInput};
pub use engine::{MemoryEngine, QueryEngine, QueryError, ResultRow, ResultSet};
pub use filter::{chart_series, date_bounds, default_filter, filter_rows, model_options};
pub use query::{AggregationQuery, aggregate, normalize};
pub use types::{
    ALL_MODELS_LABEL, Dimension, EventParam, EventRow, FilterState, ModelSelection, RawEvent, SeriesPoint,
    ValidationError,
};
pub use warehouse::{ImportStats, Warehouse};
