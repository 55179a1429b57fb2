//! Time-series ingester.
//!
//! Turns the per-parameter daily maps returned by NASA POWER into an ordered
//! sequence of `Observation` records. Pure functions, no I/O.

use chrono::NaiveDate;
use thiserror::Error;

use crate::services::power::DailySeries;

/// Errors that can occur while assembling observations from raw series.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The parameter series do not cover the same set of dates.
    #[error("parameter series have diverging date keys (speed: {speed_keys}, {parameter}: {other_keys})")]
    KeySetMismatch {
        parameter: String,
        speed_keys: usize,
        other_keys: usize,
    },
    #[error("invalid date key '{key}' in upstream series")]
    BadDateKey { key: String },
}

/// One calendar day's measurement at the requested point.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub wind_speed_ms: f64,
    pub wind_direction_deg: f64,
    /// All-sky surface shortwave irradiance, kWh/m²/day. Absent when the
    /// solar series was not requested.
    pub solar_radiation: Option<f64>,
}

/// Build the ordered observation sequence from per-parameter daily series.
///
/// All series must share the same date keys; a key present in one series but
/// missing from another fails the whole request rather than silently dropping
/// or imputing the day. The result is sorted by date ascending (the input
/// maps are `BTreeMap`s, so iteration order is already chronological).
pub fn build_observations(
    speed: &DailySeries,
    direction: &DailySeries,
    solar: Option<&DailySeries>,
) -> Result<Vec<Observation>, IngestError> {
    check_key_sets(speed, direction, "direction")?;
    if let Some(solar) = solar {
        check_key_sets(speed, solar, "solar")?;
    }

    let mut observations = Vec::with_capacity(speed.len());
    for (key, &wind_speed_ms) in speed {
        let date = NaiveDate::parse_from_str(key, "%Y%m%d")
            .map_err(|_| IngestError::BadDateKey { key: key.clone() })?;
        observations.push(Observation {
            date,
            wind_speed_ms,
            // check_key_sets guarantees the key exists in every series
            wind_direction_deg: direction[key],
            solar_radiation: solar.map(|s| s[key]),
        });
    }

    Ok(observations)
}

fn check_key_sets(
    speed: &DailySeries,
    other: &DailySeries,
    parameter: &str,
) -> Result<(), IngestError> {
    if speed.len() != other.len() || !speed.keys().eq(other.keys()) {
        return Err(IngestError::KeySetMismatch {
            parameter: parameter.to_string(),
            speed_keys: speed.len(),
            other_keys: other.len(),
        });
    }
    Ok(())
}
