//! Report assembler.
//!
//! Renders the chart images and packages observations, monthly aggregates,
//! request metadata, and the charts into a single `.xlsx` workbook.
//!
//! Chart PNGs are staged in a `TempDir` so they are removed on every exit
//! path, including failures partway through assembly. Only the workbook
//! itself survives, under the artifact store.

use chrono::{NaiveDate, Utc};
use rust_xlsxwriter::{Format, FormatAlign, Image, Workbook, Worksheet, XlsxError};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::services::aggregate::MonthlyAggregate;
use crate::services::chart::{self, ChartError, ChartKind, ChartSpec, Palette, PolarPoint};
use crate::services::storage::ArtifactStore;
use crate::services::timeseries::Observation;

pub const SHEET_INFO: &str = "Info";
pub const SHEET_WIND_DATA: &str = "Wind Data";
pub const SHEET_MONTHLY: &str = "Monthly Summary";
pub const SHEET_SCATTER: &str = "Scatter Chart";
pub const SHEET_ROSE: &str = "Wind Rose Chart";
pub const SHEET_MONTHLY_POLAR: &str = "Monthly Summary Polar";

const COL_DATE: &str = "Date";
const COL_SPEED: &str = "Wind Speed (m/s)";
const COL_DIRECTION: &str = "Wind Direction (degrees)";
const COL_SOLAR: &str = "Solar Radiation (kWh/m²/day)";
const COL_YEAR_MONTH: &str = "YearMonth";

/// Errors that can occur while assembling a report workbook.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("chart rendering failed: {0}")]
    Chart(#[from] ChartError),
    #[error("workbook error: {0}")]
    Workbook(#[from] XlsxError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request metadata echoed into the Info sheet.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub station_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Render charts, build the workbook, and write it into the store.
///
/// Returns the workbook filename for the download URL. With zero
/// observations the chart sheets are skipped and the workbook still carries
/// the (empty) data sheets plus the Info sheet.
pub fn generate_report(
    report_id: Uuid,
    meta: &ReportMeta,
    observations: &[Observation],
    aggregates: &[MonthlyAggregate],
    store: &ArtifactStore,
) -> Result<String, ReportError> {
    // Dropped on every exit path, deleting the intermediate images
    let chart_dir = tempfile::tempdir()?;

    let mut chart_files: Vec<(&str, std::path::PathBuf)> = Vec::new();
    if !observations.is_empty() {
        for (sheet_name, spec) in chart_specs(&meta.station_name, observations, aggregates) {
            let path = chart_dir
                .path()
                .join(format!("{}_{}.png", report_id, sheet_name.replace(' ', "_")));
            chart::render(&spec, &path)?;
            chart_files.push((sheet_name, path));
        }
    } else {
        tracing::warn!("Report {} has zero observations; skipping charts", report_id);
    }

    let mut workbook = Workbook::new();

    // Construction order mirrors the legacy report (tables, info, charts);
    // the canonical order is restored by order_sheets below.
    write_wind_data_sheet(workbook.add_worksheet(), observations)?;
    write_monthly_sheet(workbook.add_worksheet(), aggregates)?;
    write_info_sheet(workbook.add_worksheet(), meta)?;
    for (sheet_name, path) in &chart_files {
        write_chart_sheet(workbook.add_worksheet(), sheet_name, path)?;
    }

    order_sheets(&mut workbook);

    let filename = ArtifactStore::workbook_filename(report_id);
    workbook.save(store.workbook_path(report_id))?;

    Ok(filename)
}

/// The three chart specifications for a report, paired with sheet names.
fn chart_specs(
    station_name: &str,
    observations: &[Observation],
    aggregates: &[MonthlyAggregate],
) -> Vec<(&'static str, ChartSpec)> {
    let daily_points: Vec<PolarPoint> = observations
        .iter()
        .map(|o| PolarPoint {
            angle_deg: o.wind_direction_deg,
            magnitude: o.wind_speed_ms,
            label: None,
        })
        .collect();

    let monthly_points: Vec<PolarPoint> = aggregates
        .iter()
        .map(|a| PolarPoint {
            angle_deg: a.mean_wind_direction_deg,
            magnitude: a.mean_wind_speed,
            label: Some(a.year_month.clone()),
        })
        .collect();

    vec![
        (
            SHEET_SCATTER,
            ChartSpec {
                kind: ChartKind::Scatter,
                title: format!("Polar Wind Chart - {}", station_name),
                palette: Palette::Viridis,
                magnitude_label: COL_SPEED.to_string(),
                points: daily_points.clone(),
            },
        ),
        (
            SHEET_ROSE,
            ChartSpec {
                kind: ChartKind::Rose,
                title: format!("Polar Wind Rose - {}", station_name),
                palette: Palette::Viridis,
                magnitude_label: COL_SPEED.to_string(),
                points: daily_points,
            },
        ),
        (
            SHEET_MONTHLY_POLAR,
            ChartSpec {
                kind: ChartKind::LabeledScatter,
                title: format!("Monthly Summary Polar Chart - {}", station_name),
                palette: Palette::Plasma,
                magnitude_label: COL_SPEED.to_string(),
                points: monthly_points,
            },
        ),
    ]
}

fn date_format() -> Format {
    Format::new()
        .set_num_format("dd-mmm-yy")
        .set_align(FormatAlign::Center)
}

fn speed_format() -> Format {
    Format::new()
        .set_num_format("0.00")
        .set_align(FormatAlign::Right)
}

fn direction_format() -> Format {
    Format::new()
        .set_num_format("0")
        .set_align(FormatAlign::Center)
}

fn centered() -> Format {
    Format::new().set_align(FormatAlign::Center)
}

/// Whether any observation carries a solar value (controls the solar column).
fn has_solar(observations: &[Observation]) -> bool {
    observations.iter().any(|o| o.solar_radiation.is_some())
}

fn write_wind_data_sheet(ws: &mut Worksheet, observations: &[Observation]) -> Result<(), XlsxError> {
    ws.set_name(SHEET_WIND_DATA)?;

    let with_solar = has_solar(observations);
    ws.write_string(0, 0, COL_DATE)?;
    ws.write_string(0, 1, COL_SPEED)?;
    ws.write_string(0, 2, COL_DIRECTION)?;
    if with_solar {
        ws.write_string(0, 3, COL_SOLAR)?;
    }

    let date_fmt = date_format();
    let speed_fmt = speed_format();
    let dir_fmt = direction_format();

    for (i, obs) in observations.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write_datetime_with_format(row, 0, obs.date, &date_fmt)?;
        ws.write_number_with_format(row, 1, obs.wind_speed_ms, &speed_fmt)?;
        ws.write_number_with_format(row, 2, obs.wind_direction_deg, &dir_fmt)?;
        if let Some(solar) = obs.solar_radiation {
            ws.write_number_with_format(row, 3, solar, &speed_fmt)?;
        }
    }

    ws.autofit();
    Ok(())
}

fn write_monthly_sheet(ws: &mut Worksheet, aggregates: &[MonthlyAggregate]) -> Result<(), XlsxError> {
    ws.set_name(SHEET_MONTHLY)?;

    let with_solar = aggregates.iter().any(|a| a.mean_solar_radiation.is_some());
    ws.write_string(0, 0, COL_YEAR_MONTH)?;
    ws.write_string(0, 1, COL_SPEED)?;
    ws.write_string(0, 2, COL_DIRECTION)?;
    if with_solar {
        ws.write_string(0, 3, COL_SOLAR)?;
    }

    let center_fmt = centered();
    let speed_fmt = speed_format();
    let dir_fmt = direction_format();

    for (i, agg) in aggregates.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write_string_with_format(row, 0, &agg.year_month, &center_fmt)?;
        ws.write_number_with_format(row, 1, agg.mean_wind_speed, &speed_fmt)?;
        ws.write_number_with_format(row, 2, agg.mean_wind_direction_deg, &dir_fmt)?;
        if let Some(solar) = agg.mean_solar_radiation {
            ws.write_number_with_format(row, 3, solar, &speed_fmt)?;
        }
    }

    ws.autofit();
    Ok(())
}

fn write_info_sheet(ws: &mut Worksheet, meta: &ReportMeta) -> Result<(), XlsxError> {
    ws.set_name(SHEET_INFO)?;

    ws.write_string(0, 0, "Parameter")?;
    ws.write_string(0, 1, "Value")?;

    ws.write_string(1, 0, "Station Name")?;
    ws.write_string(1, 1, &meta.station_name)?;
    ws.write_string(2, 0, "Latitude")?;
    ws.write_number(2, 1, meta.latitude)?;
    ws.write_string(3, 0, "Longitude")?;
    ws.write_number(3, 1, meta.longitude)?;
    ws.write_string(4, 0, "Start Date")?;
    ws.write_string(4, 1, meta.start.format("%Y-%m-%d").to_string())?;
    ws.write_string(5, 0, "End Date")?;
    ws.write_string(5, 1, meta.end.format("%Y-%m-%d").to_string())?;
    ws.write_string(6, 0, "Data Source")?;
    ws.write_string(6, 1, "NASA POWER (power.larc.nasa.gov)")?;
    ws.write_string(7, 0, "Generated At")?;
    ws.write_string(7, 1, Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())?;
    ws.write_string(8, 0, "Google Maps Link")?;
    ws.write_string(
        8,
        1,
        format!(
            "https://www.google.com/maps?q={},{}",
            meta.latitude, meta.longitude
        ),
    )?;

    ws.autofit();
    Ok(())
}

fn write_chart_sheet(ws: &mut Worksheet, sheet_name: &str, image: &Path) -> Result<(), XlsxError> {
    ws.set_name(sheet_name)?;
    let image = Image::new(image)?;
    ws.insert_image(0, 0, &image)?;
    Ok(())
}

/// Canonical position of a sheet, metadata first, tables next, charts last.
fn canonical_rank(name: &str) -> usize {
    match name {
        SHEET_INFO => 0,
        SHEET_WIND_DATA => 1,
        SHEET_MONTHLY => 2,
        SHEET_SCATTER => 3,
        SHEET_ROSE => 4,
        SHEET_MONTHLY_POLAR => 5,
        _ => usize::MAX,
    }
}

/// Reorder the workbook's sheets into canonical order, regardless of the
/// order they were constructed in.
fn order_sheets(workbook: &mut Workbook) {
    workbook
        .worksheets_mut()
        .sort_by_key(|ws| canonical_rank(&ws.name()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregate::{monthly_means, MeanStrategy};
    use std::time::Duration;

    fn meta() -> ReportMeta {
        ReportMeta {
            station_name: "Test Station".to_string(),
            latitude: 47.37,
            longitude: 8.54,
            start: "2024-01-01".parse().unwrap(),
            end: "2024-01-31".parse().unwrap(),
        }
    }

    fn obs(date: &str, speed: f64, direction: f64, solar: Option<f64>) -> Observation {
        Observation {
            date: date.parse().unwrap(),
            wind_speed_ms: speed,
            wind_direction_deg: direction,
            solar_radiation: solar,
        }
    }

    fn temp_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Duration::from_secs(3600)).unwrap();
        (dir, store)
    }

    #[test]
    fn test_generate_report_full() {
        let (_dir, store) = temp_store();
        let observations = vec![
            obs("2024-01-01", 3.0, 10.0, Some(2.5)),
            obs("2024-01-02", 5.0, 350.0, Some(4.5)),
            obs("2024-02-10", 4.0, 90.0, Some(3.0)),
        ];
        let aggregates = monthly_means(&observations, MeanStrategy::Arithmetic);
        let report_id = Uuid::new_v4();

        let filename =
            generate_report(report_id, &meta(), &observations, &aggregates, &store).unwrap();

        assert_eq!(filename, ArtifactStore::workbook_filename(report_id));
        let path = store.workbook_path(report_id);
        assert!(path.exists());
        // A workbook with three embedded 1800×1800 PNGs is far from empty
        assert!(std::fs::metadata(&path).unwrap().len() > 10_000);
    }

    #[test]
    fn test_wind_data_sheet_round_trips() {
        use calamine::{open_workbook, DataType as _, Reader, Xlsx};

        let (_dir, store) = temp_store();
        let observations = vec![
            obs("2024-01-01", 3.0, 10.0, Some(2.5)),
            obs("2024-01-02", 5.0, 350.0, Some(4.5)),
            obs("2024-02-10", 4.0, 90.0, Some(3.0)),
        ];
        let aggregates = monthly_means(&observations, MeanStrategy::Arithmetic);
        let report_id = Uuid::new_v4();

        generate_report(report_id, &meta(), &observations, &aggregates, &store).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(store.workbook_path(report_id)).unwrap();

        // Saved sheet order is the canonical one
        assert_eq!(
            workbook.sheet_names(),
            vec![
                SHEET_INFO,
                SHEET_WIND_DATA,
                SHEET_MONTHLY,
                SHEET_SCATTER,
                SHEET_ROSE,
                SHEET_MONTHLY_POLAR,
            ]
        );

        // Reading the raw-data sheet back yields the written observations
        let range = workbook.worksheet_range(SHEET_WIND_DATA).unwrap();
        let rows: Vec<_> = range.rows().collect();
        assert_eq!(rows.len(), observations.len() + 1);
        assert_eq!(rows[0][0].get_string(), Some(COL_DATE));
        assert_eq!(rows[0][1].get_string(), Some(COL_SPEED));
        assert_eq!(rows[0][2].get_string(), Some(COL_DIRECTION));
        assert_eq!(rows[0][3].get_string(), Some(COL_SOLAR));

        for (row, obs) in rows[1..].iter().zip(&observations) {
            assert_eq!(row[0].as_date(), Some(obs.date));
            assert!((row[1].get_float().unwrap() - obs.wind_speed_ms).abs() < 1e-9);
            assert!((row[2].get_float().unwrap() - obs.wind_direction_deg).abs() < 1e-9);
            assert!((row[3].get_float().unwrap() - obs.solar_radiation.unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_monthly_sheet_round_trips() {
        use calamine::{open_workbook, DataType as _, Reader, Xlsx};

        let (_dir, store) = temp_store();
        let observations = vec![
            obs("2024-01-01", 3.0, 10.0, None),
            obs("2024-01-02", 5.0, 350.0, None),
        ];
        let aggregates = monthly_means(&observations, MeanStrategy::Arithmetic);
        let report_id = Uuid::new_v4();

        generate_report(report_id, &meta(), &observations, &aggregates, &store).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(store.workbook_path(report_id)).unwrap();
        let range = workbook.worksheet_range(SHEET_MONTHLY).unwrap();
        let rows: Vec<_> = range.rows().collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0].get_string(), Some("2024-01"));
        assert!((rows[1][1].get_float().unwrap() - 4.0).abs() < 1e-9);
        assert!((rows[1][2].get_float().unwrap() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_generate_report_empty_observations() {
        let (_dir, store) = temp_store();
        let report_id = Uuid::new_v4();

        let filename = generate_report(report_id, &meta(), &[], &[], &store).unwrap();

        assert_eq!(filename, ArtifactStore::workbook_filename(report_id));
        assert!(store.workbook_path(report_id).exists());
    }

    #[test]
    fn test_generate_report_without_solar() {
        let (_dir, store) = temp_store();
        let observations = vec![obs("2024-01-01", 3.0, 10.0, None)];
        let aggregates = monthly_means(&observations, MeanStrategy::Arithmetic);
        let report_id = Uuid::new_v4();

        let filename =
            generate_report(report_id, &meta(), &observations, &aggregates, &store).unwrap();
        assert!(store.resolve(&filename).is_some());
    }

    #[test]
    fn test_sheet_order_canonical_regardless_of_insertion() {
        let mut workbook = Workbook::new();
        // Deliberately scrambled construction order
        workbook.add_worksheet().set_name(SHEET_ROSE).unwrap();
        workbook.add_worksheet().set_name(SHEET_MONTHLY).unwrap();
        workbook.add_worksheet().set_name(SHEET_INFO).unwrap();
        workbook
            .add_worksheet()
            .set_name(SHEET_MONTHLY_POLAR)
            .unwrap();
        workbook.add_worksheet().set_name(SHEET_WIND_DATA).unwrap();
        workbook.add_worksheet().set_name(SHEET_SCATTER).unwrap();

        order_sheets(&mut workbook);

        let names: Vec<String> = workbook
            .worksheets_mut()
            .iter()
            .map(|ws| ws.name())
            .collect();
        assert_eq!(
            names,
            vec![
                SHEET_INFO,
                SHEET_WIND_DATA,
                SHEET_MONTHLY,
                SHEET_SCATTER,
                SHEET_ROSE,
                SHEET_MONTHLY_POLAR,
            ]
        );
    }

    #[test]
    fn test_chart_specs_cover_all_three_charts() {
        let observations = vec![obs("2024-01-01", 3.0, 10.0, None)];
        let aggregates = monthly_means(&observations, MeanStrategy::Arithmetic);

        let specs = chart_specs("Station X", &observations, &aggregates);

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].0, SHEET_SCATTER);
        assert_eq!(specs[1].0, SHEET_ROSE);
        assert_eq!(specs[2].0, SHEET_MONTHLY_POLAR);
        assert!(specs[0].1.title.contains("Station X"));
        // Monthly points carry their year-month labels
        assert_eq!(
            specs[2].1.points[0].label.as_deref(),
            Some("2024-01")
        );
    }

    #[test]
    fn test_intermediate_images_cleaned_up() {
        let (_dir, store) = temp_store();
        let observations = vec![obs("2024-01-01", 3.0, 10.0, None)];
        let aggregates = monthly_means(&observations, MeanStrategy::Arithmetic);
        let report_id = Uuid::new_v4();

        generate_report(report_id, &meta(), &observations, &aggregates, &store).unwrap();

        // No stray PNGs next to the workbook; intermediates lived in a TempDir
        let leftovers: Vec<_> = std::fs::read_dir(_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
