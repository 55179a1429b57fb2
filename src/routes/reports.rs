//! Report HTTP endpoints.
//!
//! - POST /generate-files — fetch, aggregate, chart, and package a report
//! - GET /download/:filename — retrieve a previously generated workbook

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, ErrorResponse};
use crate::services::aggregate::{monthly_means, MeanStrategy};
use crate::services::power::{
    PowerClient, PARAM_SOLAR, PARAM_WIND_DIRECTION, PARAM_WIND_SPEED,
};
use crate::services::report::{generate_report, ReportMeta};
use crate::services::storage::ArtifactStore;
use crate::services::timeseries::build_observations;

/// MIME type for `.xlsx` workbooks.
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Shared application state for report endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) power_client: PowerClient,
    pub(crate) store: ArtifactStore,
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Report generation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Display name for the station/location (free text)
    pub station_name: String,
    /// Latitude in decimal degrees, [-90, 90]
    pub latitude: f64,
    /// Longitude in decimal degrees, [-180, 180]
    pub longitude: f64,
    /// First day of the observation range (ISO date)
    pub start: NaiveDate,
    /// Last day of the observation range (ISO date), inclusive
    pub end: NaiveDate,
}

/// Report generation response.
#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateResponse {
    /// Relative download path of the generated workbook
    pub excel_file_url: String,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Boundary validation for report requests.
///
/// Rejecting `start > end` and out-of-range coordinates here keeps an
/// empty-but-valid-looking report from silently shipping.
fn validate_request(request: &GenerateRequest) -> Result<(), AppError> {
    if request.start > request.end {
        return Err(AppError::BadRequest(format!(
            "start date {} is after end date {}",
            request.start, request.end
        )));
    }
    // is_finite() first: NaN passes range comparisons either way.
    if !request.latitude.is_finite() || !request.longitude.is_finite() {
        return Err(AppError::BadRequest(
            "latitude and longitude must be finite numbers".to_string(),
        ));
    }
    if !(-90.0..=90.0).contains(&request.latitude) {
        return Err(AppError::BadRequest(format!(
            "latitude {} out of range [-90, 90]",
            request.latitude
        )));
    }
    if !(-180.0..=180.0).contains(&request.longitude) {
        return Err(AppError::BadRequest(format!(
            "longitude {} out of range [-180, 180]",
            request.longitude
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Generate a wind/solar report workbook for a geographic point.
///
/// Fetches daily wind speed, wind direction, and solar irradiance from NASA
/// POWER (two concurrent requests), aggregates by month, renders the polar
/// charts, and assembles everything into an `.xlsx` workbook addressed by a
/// fresh report UUID.
#[utoipa::path(
    post,
    path = "/generate-files",
    tag = "Reports",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Report generated", body = GenerateResponse),
        (status = 400, description = "Invalid request (start > end, coordinates out of range)", body = ErrorResponse),
        (status = 502, description = "NASA POWER unreachable or returned a malformed payload", body = ErrorResponse),
    )
)]
pub async fn generate_files(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    validate_request(&request)?;

    let report_id = Uuid::new_v4();
    tracing::info!(
        "Report {}: station '{}' at ({}, {}), {} to {}",
        report_id,
        request.station_name,
        request.latitude,
        request.longitude,
        request.start,
        request.end
    );

    // Wind and solar come from separate POWER queries; fetch them in parallel.
    let (wind, solar) = futures::try_join!(
        state.power_client.fetch_daily(
            request.latitude,
            request.longitude,
            request.start,
            request.end,
            &[PARAM_WIND_SPEED, PARAM_WIND_DIRECTION],
        ),
        state.power_client.fetch_daily(
            request.latitude,
            request.longitude,
            request.start,
            request.end,
            &[PARAM_SOLAR],
        ),
    )?;

    let observations = build_observations(&wind[0], &wind[1], Some(&solar[0]))?;
    let aggregates = monthly_means(&observations, MeanStrategy::Arithmetic);
    tracing::debug!(
        "Report {}: {} observations across {} month(s)",
        report_id,
        observations.len(),
        aggregates.len()
    );

    let meta = ReportMeta {
        station_name: request.station_name,
        latitude: request.latitude,
        longitude: request.longitude,
        start: request.start,
        end: request.end,
    };

    // Chart rendering and workbook writing are CPU/file-bound; keep them off
    // the async worker threads.
    let store = state.store.clone();
    let filename = tokio::task::spawn_blocking(move || {
        generate_report(report_id, &meta, &observations, &aggregates, &store)
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Report task panicked: {}", e)))??;

    Ok(Json(GenerateResponse {
        excel_file_url: format!("/download/{}", filename),
    }))
}

/// Download a previously generated workbook.
///
/// Filenames are validated against the store's `{uuid}_wind_data_with_charts.xlsx`
/// pattern; anything else is a 404, same as a file that has been swept.
#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "Reports",
    params(
        ("filename" = String, Path, description = "Workbook filename from excel_file_url"),
    ),
    responses(
        (status = 200, description = "Workbook bytes",
         content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 404, description = "File not found", body = ErrorResponse),
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let path = state
        .store
        .resolve(&filename)
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to read workbook: {}", e)))?;

    let headers = [
        (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];

    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start: &str, end: &str, latitude: f64, longitude: f64) -> GenerateRequest {
        GenerateRequest {
            station_name: "Test".to_string(),
            latitude,
            longitude,
            start: start.parse().unwrap(),
            end: end.parse().unwrap(),
        }
    }

    #[test]
    fn test_validate_accepts_normal_request() {
        let req = request("2024-01-01", "2024-03-31", 47.37, 8.54);
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_validate_accepts_single_day_range() {
        let req = request("2024-01-01", "2024-01-01", 0.0, 0.0);
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_validate_rejects_start_after_end() {
        let req = request("2024-03-31", "2024-01-01", 47.37, 8.54);
        match validate_request(&req) {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("after end date")),
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range_latitude() {
        let req = request("2024-01-01", "2024-01-31", 91.0, 8.54);
        assert!(matches!(
            validate_request(&req),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_longitude() {
        let req = request("2024-01-01", "2024-01-31", 47.37, -180.5);
        assert!(matches!(
            validate_request(&req),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite_coordinates() {
        let req = request("2024-01-01", "2024-01-31", f64::NAN, 8.54);
        assert!(matches!(
            validate_request(&req),
            Err(AppError::BadRequest(_))
        ));
    }
}
