//! Tests for the CSV record sink.

use std::fs;

use chrono::{NaiveDate, NaiveTime};
use rstest::*;
use tempfile::TempDir;

use light_engine_characterization::{
    persist::{CsvSink, ResultSink},
    record::MeasurementRecord,
};

fn sample_record(extended: bool) -> MeasurementRecord {
    MeasurementRecord {
        light_engine_id: "LE-01".to_string(),
        channel: 2,
        date: NaiveDate::from_ymd_opt(2026, 8, 29).unwrap(),
        time: NaiveTime::from_hms_opt(14, 30, 5).unwrap(),
        bias_current_ma: 150.0,
        voltage_v: 1.8,
        tec_temp_c: 25.0,
        ambient_temp_c: 30.0,
        light_engine_temp_c: 50.0,
        mpd_ma: 1.2,
        wavelength_nm: vec![1565.0, 1575.0, 1585.0],
        power_dbm: vec![-60.0, -5.0, -60.0],
        power_uw: vec![0.001, 316.22776601683796, 0.001],
        peak_wavelength_nm: 1575.0,
        peak_power_dbm: -5.0,
        smsr_db: extended.then_some(42.0),
        smsr_offset_nm: extended.then_some(0.8),
        linewidth_3db_nm: extended.then_some(0.03),
        linewidth_20db_nm: extended.then_some(0.2),
    }
}

#[rstest]
fn test_csv_sink_writes_header_and_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.csv");

    let mut sink = CsvSink::create(&path).unwrap();
    sink.record(&sample_record(true)).unwrap();
    sink.record(&sample_record(false)).unwrap();
    drop(sink);

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("light_engine_id,channel,date,time"));

    let fields: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(fields.len(), 19);
    assert_eq!(fields[0], "LE-01");
    assert_eq!(fields[2], "2026-08-29");
    assert_eq!(fields[3], "14:30:05");
    assert_eq!(fields[12], "42");
    // Spectra are space-separated inside one field.
    assert_eq!(fields[16], "1565 1575 1585");
}

/// Absent extended metrics become empty CSV fields, not sentinels.
#[rstest]
fn test_csv_sink_leaves_gated_metrics_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.csv");

    let mut sink = CsvSink::create(&path).unwrap();
    sink.record(&sample_record(false)).unwrap();
    drop(sink);

    let text = fs::read_to_string(&path).unwrap();
    let fields: Vec<&str> = text.lines().nth(1).unwrap().split(',').collect();
    for metric in &fields[12..16] {
        assert!(metric.is_empty());
    }
}

/// Every record lands on disk as soon as it is written; a crash later in
/// the run cannot take finished points with it.
#[rstest]
fn test_csv_sink_flushes_per_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.csv");

    let mut sink = CsvSink::create(&path).unwrap();
    sink.record(&sample_record(true)).unwrap();

    // The sink is still open and holds the file; the record must already
    // be readable.
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 2);
    drop(sink);
}
