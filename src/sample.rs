//! Random demo events for populating a local warehouse.

use crate::types::{Dimension, RawEvent};
use chrono::{Duration, NaiveDate};
use eyre::Result;
use rand::Rng;

const MODELS: &[&str] = &["Aurora", "Borealis", "Cirrus"];
const VARIANTS: &[&str] = &["Base", "Sport", "Touring"];
const COLORS: &[&str] = &["Red", "Blue", "Graphite", "Pearl"];
const FEATURES: &[&str] = &["Lights", "Seats", "Sunroof", "Sound"];
const ACCESSORIES: &[&str] = &["Roof Box", "Bike Rack", "Floor Mats"];
const PACKS: &[&str] = &["Winter", "Adventure", "Comfort"];

/// Share of generated events that carry no dimension or miss a required key.
const NOISE_PERCENT: u32 = 15;

/// Upper bound on events produced by one call.
pub const MAX_EVENTS: usize = 10_000_000;

fn pick<'a, R: Rng>(rng: &mut R, values: &[&'a str]) -> &'a str {
    values[rng.random_range(0..values.len())]
}

/// Generate `per_day` events for each of the `days` days ending at `through`.
///
/// Most events are well-formed dimension events; the rest exercise the
/// filtering rules (page views, missing variants, keys on the wrong event).
/// Fails when the total exceeds [`MAX_EVENTS`] or the first day falls outside
/// the calendar range.
pub fn generate<R: Rng>(rng: &mut R, through: NaiveDate, days: u32, per_day: u32) -> Result<Vec<RawEvent>> {
    let total = (days as usize)
        .checked_mul(per_day as usize)
        .filter(|n| *n <= MAX_EVENTS)
        .ok_or_else(|| eyre::eyre!("{} day(s) of {} event(s) exceeds {} events", days, per_day, MAX_EVENTS))?;

    let first = through
        .checked_sub_signed(Duration::days(i64::from(days.saturating_sub(1))))
        .ok_or_else(|| eyre::eyre!("{} day(s) before {} is out of range", days, through))?;

    let mut events = Vec::with_capacity(total);

    for date in first.iter_days().take(days as usize) {
        for _ in 0..per_day {
            let model = pick(rng, MODELS);
            let variant = pick(rng, VARIANTS);

            if rng.random_range(0..100) < NOISE_PERCENT {
                events.push(noise_event(rng, date, model, variant));
                continue;
            }

            let dimension = Dimension::ALL[rng.random_range(0..Dimension::ALL.len())];
            let value = match dimension {
                Dimension::Color => pick(rng, COLORS),
                Dimension::Feature => pick(rng, FEATURES),
                Dimension::Accessory => pick(rng, ACCESSORIES),
                Dimension::Pack => pick(rng, PACKS),
            };

            events.push(
                RawEvent::new(date, dimension.event_name())
                    .with_param("model", model)
                    .with_param("variant", variant)
                    .with_param(dimension.param_key(), value),
            );
        }
    }

    Ok(events)
}

fn noise_event<R: Rng>(rng: &mut R, date: NaiveDate, model: &str, variant: &str) -> RawEvent {
    match rng.random_range(0..3) {
        0 => RawEvent::new(date, "page_view")
            .with_param("model", model)
            .with_param("variant", variant),
        1 => RawEvent::new(date, "color_changed")
            .with_param("model", model)
            .with_param("color", pick(rng, COLORS)),
        _ => RawEvent::new(date, "feature_clicked")
            .with_param("model", model)
            .with_param("variant", variant)
            .with_param("color", pick(rng, COLORS)),
    }
}
