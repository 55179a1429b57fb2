//! NASA POWER daily-point API client.
//!
//! Fetches daily meteorological time series for a geographic point.
//! See: https://power.larc.nasa.gov/docs/services/api/temporal/daily/

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::errors::AppError;

/// Parameter code for wind speed at 2 m, in m/s.
pub const PARAM_WIND_SPEED: &str = "WS2M";
/// Parameter code for wind direction at 2 m, in degrees.
pub const PARAM_WIND_DIRECTION: &str = "WD2M";
/// Parameter code for all-sky surface shortwave downward irradiance, kWh/m²/day.
pub const PARAM_SOLAR: &str = "ALLSKY_SFC_SW_DWN";

/// Client for the NASA POWER daily temporal point API.
#[derive(Debug, Clone)]
pub struct PowerClient {
    client: reqwest::Client,
    base_url: String,
}

/// Daily series for one parameter: `YYYYMMDD` key → measured value.
///
/// A `BTreeMap` keeps the keys in ascending date order, which the ingester
/// relies on for chronological output.
pub type DailySeries = BTreeMap<String, f64>;

// --- NASA POWER JSON response types ---

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: BTreeMap<String, DailySeries>,
}

impl PowerClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch daily series for the given parameter codes over a date range.
    ///
    /// Returns one `DailySeries` per requested code, in the order requested.
    /// A missing code in the response body counts as a malformed payload.
    pub async fn fetch_daily(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
        parameters: &[&str],
    ) -> Result<Vec<DailySeries>, AppError> {
        let url = format!(
            "{}?parameters={}&community=RE&latitude={}&longitude={}&start={}&end={}&format=JSON",
            self.base_url,
            parameters.join(","),
            latitude,
            longitude,
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::ExternalServiceError(format!("NASA POWER request failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "NASA POWER returned HTTP {}",
                response.status()
            )));
        }

        let body: PowerResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("NASA POWER JSON parse error: {}", e))
        })?;

        let mut series = Vec::with_capacity(parameters.len());
        for &code in parameters {
            let daily = body.properties.parameter.get(code).ok_or_else(|| {
                AppError::ExternalServiceError(format!(
                    "NASA POWER response missing parameter '{}'",
                    code
                ))
            })?;
            series.push(daily.clone());
        }

        Ok(series)
    }
}
