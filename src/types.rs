//! Core data types for Eventboard.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Label of the select-input entry that disables model filtering.
pub const ALL_MODELS_LABEL: &str = "All Models";

/// One aggregated row returned by the aggregation query.
///
/// Rows are unique per `(event_date, model_name, variant_name, color_name,
/// feature_name, accessory_name, pack_name)` and immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRow {
    /// Calendar day the events were ingested on
    pub event_date: NaiveDate,

    pub model_name: String,

    pub variant_name: String,

    /// Set only for `color_changed` events
    pub color_name: Option<String>,

    /// Set only for `feature_clicked` events
    pub feature_name: Option<String>,

    /// Set only for `accessory_clicked` events
    pub accessory_name: Option<String>,

    /// Set only for `accessory_pack_clicked` events
    pub pack_name: Option<String>,

    /// Number of raw events collapsed into this row
    pub event_count: u64,
}

/// Grouping key of an [`EventRow`]. Field order is the sort order.
pub type RowKey = (
    NaiveDate,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

impl EventRow {
    /// The seven-column grouping key.
    pub fn key(&self) -> RowKey {
        (
            self.event_date,
            self.model_name.clone(),
            self.variant_name.clone(),
            self.color_name.clone(),
            self.feature_name.clone(),
            self.accessory_name.clone(),
            self.pack_name.clone(),
        )
    }

    /// Value of the given dimension column.
    pub fn dimension_value(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Color => self.color_name.as_deref(),
            Dimension::Feature => self.feature_name.as_deref(),
            Dimension::Accessory => self.accessory_name.as_deref(),
            Dimension::Pack => self.pack_name.as_deref(),
        }
    }

    /// First populated dimension, if any.
    pub fn dimension(&self) -> Option<(Dimension, &str)> {
        Dimension::ALL
            .into_iter()
            .find_map(|d| self.dimension_value(d).map(|v| (d, v)))
    }
}

/// The four mutually-exclusive attributes describing what a user interacted with.
///
/// Each dimension is extracted from exactly one event name; a value carried by
/// any other event is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Color,
    Feature,
    Accessory,
    Pack,
}

impl Dimension {
    /// All dimensions in column order.
    pub const ALL: [Dimension; 4] = [
        Dimension::Color,
        Dimension::Feature,
        Dimension::Accessory,
        Dimension::Pack,
    ];

    /// The event name that carries this dimension.
    pub fn event_name(&self) -> &'static str {
        match self {
            Dimension::Color => "color_changed",
            Dimension::Feature => "feature_clicked",
            Dimension::Accessory => "accessory_clicked",
            Dimension::Pack => "accessory_pack_clicked",
        }
    }

    /// Parameter key holding the value.
    pub fn param_key(&self) -> &'static str {
        match self {
            Dimension::Color => "color",
            Dimension::Feature => "feature",
            Dimension::Accessory => "accessory",
            Dimension::Pack => "pack",
        }
    }

    /// Intermediate column name used in the query.
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Color => "color_name",
            Dimension::Feature => "feature_name",
            Dimension::Accessory => "accessory_name",
            Dimension::Pack => "pack_name",
        }
    }

    /// Column name in the query output.
    pub fn output_column(&self) -> &'static str {
        match self {
            Dimension::Color => "distinct_color_names",
            Dimension::Feature => "distinct_feature_names",
            Dimension::Accessory => "distinct_accessory_names",
            Dimension::Pack => "distinct_pack_names",
        }
    }

    /// Map an event name to the dimension it carries.
    pub fn for_event(event_name: &str) -> Option<Dimension> {
        Dimension::ALL.into_iter().find(|d| d.event_name() == event_name)
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.param_key())
    }
}

/// A raw event as ingested by the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEvent {
    /// Ingestion day, encoded as `YYYYMMDD` on the wire
    #[serde(with = "partition_date")]
    pub event_date: NaiveDate,

    pub event_name: String,

    /// Generic key-value parameters, in ingestion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<EventParam>,
}

/// One key-value parameter of a raw event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventParam {
    pub key: String,

    /// String value; `None` when the parameter holds a non-string value
    #[serde(default, deserialize_with = "string_value")]
    pub value: Option<String>,
}

impl EventParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

impl RawEvent {
    /// Create an event with no parameters.
    pub fn new(event_date: NaiveDate, event_name: impl Into<String>) -> Self {
        Self {
            event_date,
            event_name: event_name.into(),
            params: Vec::new(),
        }
    }

    /// Append a string parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(EventParam::new(key, value));
        self
    }

    /// String value of the first parameter named `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.value.as_deref())
    }

    /// Partition suffix (`YYYYMMDD`) this event is stored under.
    pub fn partition_suffix(&self) -> String {
        self.event_date.format(PARTITION_FORMAT).to_string()
    }

    /// Validate the event's fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_name.is_empty() {
            return Err(ValidationError::EmptyEventName);
        }
        if self.event_name.chars().any(|c| c.is_control()) {
            return Err(ValidationError::InvalidCharacters);
        }
        for param in &self.params {
            if param.key.is_empty() {
                return Err(ValidationError::EmptyParamKey);
            }
        }
        Ok(())
    }
}

/// Date encoding of warehouse partitions.
pub const PARTITION_FORMAT: &str = "%Y%m%d";

mod partition_date {
    use super::PARTITION_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(PARTITION_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, PARTITION_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Keep string parameter values; numbers, bools and nested values read as null.
fn string_value<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Validation errors for raw events.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyEventName,
    InvalidCharacters,
    EmptyParamKey,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyEventName => write!(f, "event name cannot be empty"),
            ValidationError::InvalidCharacters => write!(f, "event name contains control characters"),
            ValidationError::EmptyParamKey => write!(f, "parameter key cannot be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Which model the dashboard is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSelection {
    #[default]
    All,
    Model(String),
}

impl ModelSelection {
    /// Parse user input; `all` (any case) and the "All Models" label select everything.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.eq_ignore_ascii_case("all") || input == ALL_MODELS_LABEL {
            ModelSelection::All
        } else {
            ModelSelection::Model(input.to_string())
        }
    }

    /// Returns true if rows of `model_name` pass this selection.
    pub fn matches(&self, model_name: &str) -> bool {
        match self {
            ModelSelection::All => true,
            ModelSelection::Model(m) => m == model_name,
        }
    }
}

impl std::fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSelection::All => write!(f, "{}", ALL_MODELS_LABEL),
            ModelSelection::Model(m) => write!(f, "{}", m),
        }
    }
}

/// User-chosen filter over the fetched rows. Both date bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub selected_model: ModelSelection,
}

impl FilterState {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, selected_model: ModelSelection) -> Self {
        Self {
            start_date,
            end_date,
            selected_model,
        }
    }

    /// Returns true if the row passes both the date range and the model selection.
    ///
    /// An inverted range (`start_date > end_date`) matches nothing.
    pub fn matches(&self, row: &EventRow) -> bool {
        self.start_date <= row.event_date
            && row.event_date <= self.end_date
            && self.selected_model.matches(&row.model_name)
    }
}

/// One chart point: a filtered row projected to `(date, count)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn make_row(model: &str) -> EventRow {
        EventRow {
            event_date: day(1),
            model_name: model.to_string(),
            variant_name: "V1".to_string(),
            color_name: Some("Red".to_string()),
            feature_name: None,
            accessory_name: None,
            pack_name: None,
            event_count: 3,
        }
    }

    #[test]
    fn test_dimension_for_event() {
        assert_eq!(Dimension::for_event("color_changed"), Some(Dimension::Color));
        assert_eq!(Dimension::for_event("feature_clicked"), Some(Dimension::Feature));
        assert_eq!(Dimension::for_event("accessory_clicked"), Some(Dimension::Accessory));
        assert_eq!(Dimension::for_event("accessory_pack_clicked"), Some(Dimension::Pack));
        assert_eq!(Dimension::for_event("page_view"), None);
    }

    #[test]
    fn test_raw_event_param_first_wins() {
        let event = RawEvent::new(day(1), "color_changed")
            .with_param("color", "Red")
            .with_param("color", "Blue");
        assert_eq!(event.param("color"), Some("Red"));
        assert_eq!(event.param("model"), None);
    }

    #[test]
    fn test_raw_event_param_non_string_value() {
        let mut event = RawEvent::new(day(1), "color_changed");
        event.params.push(EventParam {
            key: "color".to_string(),
            value: None,
        });
        event.params.push(EventParam::new("color", "Red"));
        assert_eq!(event.param("color"), None);
    }

    #[test]
    fn test_raw_event_non_string_values_deserialize_as_null() {
        let json = r#"{"event_date":"20240101","event_name":"color_changed","params":[
            {"key":"ga_session_id","value":1234},
            {"key":"engaged","value":true},
            {"key":"score","value":1.5},
            {"key":"color","value":"Red"},
            {"key":"missing"}
        ]}"#;
        let event: RawEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.params.len(), 5);
        assert_eq!(event.param("ga_session_id"), None);
        assert_eq!(event.param("engaged"), None);
        assert_eq!(event.param("score"), None);
        assert_eq!(event.param("missing"), None);
        assert_eq!(event.param("color"), Some("Red"));
    }

    #[test]
    fn test_raw_event_validation() {
        assert!(RawEvent::new(day(1), "color_changed").validate().is_ok());
        assert_eq!(
            RawEvent::new(day(1), "").validate(),
            Err(ValidationError::EmptyEventName)
        );
        assert_eq!(
            RawEvent::new(day(1), "bad\nname").validate(),
            Err(ValidationError::InvalidCharacters)
        );
        assert_eq!(
            RawEvent::new(day(1), "color_changed").with_param("", "x").validate(),
            Err(ValidationError::EmptyParamKey)
        );
    }

    #[test]
    fn test_raw_event_partition_date_encoding() {
        let event = RawEvent::new(day(2), "feature_clicked").with_param("feature", "Lights");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_date\":\"20240102\""));
        let parsed: RawEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(event.partition_suffix(), "20240102");
    }

    #[test]
    fn test_model_selection_from_input() {
        assert_eq!(ModelSelection::from_input("all"), ModelSelection::All);
        assert_eq!(ModelSelection::from_input("ALL"), ModelSelection::All);
        assert_eq!(ModelSelection::from_input("All Models"), ModelSelection::All);
        assert_eq!(
            ModelSelection::from_input(" ModelA "),
            ModelSelection::Model("ModelA".to_string())
        );
    }

    #[test]
    fn test_filter_state_matches() {
        let row = make_row("ModelA");
        let all = FilterState::new(day(1), day(1), ModelSelection::All);
        assert!(all.matches(&row));

        let other = FilterState::new(day(1), day(1), ModelSelection::Model("ModelB".to_string()));
        assert!(!other.matches(&row));

        let inverted = FilterState::new(day(2), day(1), ModelSelection::All);
        assert!(!inverted.matches(&row));
    }

    #[test]
    fn test_event_row_dimension() {
        let row = make_row("ModelA");
        assert_eq!(row.dimension(), Some((Dimension::Color, "Red")));
        assert_eq!(row.dimension_value(Dimension::Pack), None);
    }
}
