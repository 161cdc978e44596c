//! The measurement record produced at every sweep coordinate.

use chrono::{NaiveDate, NaiveTime};

/// Convert an optical power from dBm to microwatts.
pub fn dbm_to_uw(power_dbm: f64) -> f64 {
    10f64.powf(power_dbm / 10.0) * 1000.0
}

/// One fully-measured operating point of one light-engine channel.
///
/// The extended spectral metrics (`smsr_db` and the linewidths) are only
/// meaningful when the laser is actually lasing; below the peak-power gate
/// they are left as `None` and persisted as SQL `NULL` / empty CSV fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Serial number or label of the device under test.
    pub light_engine_id: String,
    /// Light-engine channel the record belongs to.
    pub channel: usize,
    /// Acquisition date (local time).
    pub date: NaiveDate,
    /// Acquisition time of day (local time).
    pub time: NaiveTime,
    /// Bias current read back from the driver, in milliamps.
    pub bias_current_ma: f64,
    /// Laser forward voltage, in volts.
    pub voltage_v: f64,
    /// Measured TEC temperature, in Celsius.
    pub tec_temp_c: f64,
    /// Carrier-board ambient temperature, in Celsius. `NaN` when no board
    /// monitor is attached.
    pub ambient_temp_c: f64,
    /// On-board light-engine temperature, in Celsius. `NaN` when no board
    /// monitor is attached.
    pub light_engine_temp_c: f64,
    /// Monitor-photodiode current, in milliamps. `NaN` when no board monitor
    /// is attached.
    pub mpd_ma: f64,
    /// Wavelength grid of the captured spectrum, in nanometers.
    pub wavelength_nm: Vec<f64>,
    /// Captured spectrum, in dBm.
    pub power_dbm: Vec<f64>,
    /// Captured spectrum converted to microwatts.
    pub power_uw: Vec<f64>,
    /// Wavelength of the spectral peak, in nanometers.
    pub peak_wavelength_nm: f64,
    /// Power of the spectral peak, in dBm.
    pub peak_power_dbm: f64,
    /// Side-mode suppression ratio, in dB.
    pub smsr_db: Option<f64>,
    /// Wavelength offset of the largest side mode from the peak, in
    /// nanometers.
    pub smsr_offset_nm: Option<f64>,
    /// 3 dB linewidth, in nanometers.
    pub linewidth_3db_nm: Option<f64>,
    /// 20 dB linewidth, in nanometers.
    pub linewidth_20db_nm: Option<f64>,
}

/// Progress of a running sweep, for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgress {
    /// Coordinates measured so far.
    pub completed: usize,
    /// Total coordinates in the sweep grid.
    pub total: usize,
}

impl SweepProgress {
    /// Completed fraction of the grid in percent.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dbm_to_uw() {
        assert!((dbm_to_uw(0.0) - 1000.0).abs() < 1e-9);
        assert!((dbm_to_uw(-30.0) - 1.0).abs() < 1e-9);
        assert!((dbm_to_uw(10.0) - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_progress_percent() {
        let progress = SweepProgress {
            completed: 3,
            total: 6,
        };
        assert!((progress.percent() - 50.0).abs() < 1e-12);
    }
}
