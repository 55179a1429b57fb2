//! Monthly aggregation of daily observations.
//!
//! Groups observations by calendar month and computes per-month means.
//! The direction mean is a plain arithmetic mean of degree values by default,
//! matching the historical report output: a month with observations near 359°
//! and 1° averages to ~180°, the opposite direction. `MeanStrategy::Circular`
//! is available for callers who want the mathematically sound vector mean.

use chrono::Datelike;
use std::collections::BTreeMap;

use crate::services::timeseries::Observation;

/// How to average wind direction within a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeanStrategy {
    /// Plain arithmetic mean of degree values.
    #[default]
    Arithmetic,
    /// Vector (circular) mean, wrap-around safe, normalized to [0, 360).
    Circular,
}

/// One calendar month's summary.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyAggregate {
    /// Grouping key, e.g. "2024-03".
    pub year_month: String,
    pub mean_wind_speed: f64,
    pub mean_wind_direction_deg: f64,
    /// Mean solar irradiance, kWh/m²/day. `None` when no observation in the
    /// month carried a solar value.
    pub mean_solar_radiation: Option<f64>,
}

/// Group observations by year-month and compute per-month means.
///
/// Returns one aggregate per distinct month present in the input, in
/// chronological order. An empty input yields an empty output.
pub fn monthly_means(observations: &[Observation], strategy: MeanStrategy) -> Vec<MonthlyAggregate> {
    let mut groups: BTreeMap<(i32, u32), Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        groups
            .entry((obs.date.year(), obs.date.month()))
            .or_default()
            .push(obs);
    }

    groups
        .into_iter()
        .map(|((year, month), members)| {
            let n = members.len() as f64;
            let mean_wind_speed = members.iter().map(|o| o.wind_speed_ms).sum::<f64>() / n;

            let mean_wind_direction_deg = match strategy {
                MeanStrategy::Arithmetic => {
                    members.iter().map(|o| o.wind_direction_deg).sum::<f64>() / n
                }
                MeanStrategy::Circular => circular_mean_deg(
                    members.iter().map(|o| o.wind_direction_deg),
                ),
            };

            let solar_values: Vec<f64> =
                members.iter().filter_map(|o| o.solar_radiation).collect();
            let mean_solar_radiation = if solar_values.is_empty() {
                None
            } else {
                Some(solar_values.iter().sum::<f64>() / solar_values.len() as f64)
            };

            MonthlyAggregate {
                year_month: format!("{:04}-{:02}", year, month),
                mean_wind_speed,
                mean_wind_direction_deg,
                mean_solar_radiation,
            }
        })
        .collect()
}

/// Vector mean of angles in degrees, normalized to [0, 360).
fn circular_mean_deg(angles_deg: impl Iterator<Item = f64>) -> f64 {
    let (mut sin_sum, mut cos_sum, mut n) = (0.0_f64, 0.0_f64, 0usize);
    for deg in angles_deg {
        let rad = deg.to_radians();
        sin_sum += rad.sin();
        cos_sum += rad.cos();
        n += 1;
    }
    if n == 0 {
        return 0.0;
    }
    let mean = sin_sum.atan2(cos_sum).to_degrees();
    (mean + 360.0) % 360.0
}
