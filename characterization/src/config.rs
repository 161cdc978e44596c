//! Suite configuration, loaded from a TOML file.

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{acquire::SettlingConfig, axis::SweepAxis, error::RunError};

/// Everything a characterization run needs to know, minus the per-run bits
/// (device ID, channel) that come from the command line.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    /// Where the instruments are.
    pub instruments: InstrumentSection,
    /// The sweep grid.
    pub sweep: SweepSection,
    /// Spectrum analyzer capture settings.
    #[serde(default)]
    pub osa: OsaSection,
    /// Temperature settling behavior.
    #[serde(default)]
    pub settling: SettlingSection,
    /// Database sink; omit to run without one.
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    /// End-of-run notification; omit to run silently.
    #[serde(default)]
    pub notification: Option<NotificationSection>,
}

impl SuiteConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RunError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            RunError::InvalidConfiguration(format!("cannot read {}: {err}", path.display()))
        })?;
        toml::from_str(&text).map_err(|err| {
            RunError::InvalidConfiguration(format!("cannot parse {}: {err}", path.display()))
        })
    }
}

/// Addresses and ports of the instruments.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentSection {
    /// Serial port of the TEC source, e.g., `"/dev/ttyUSB0"`.
    pub tec_port: String,
    /// Serial port of the laser diode driver.
    pub ldd_port: String,
    /// Laser diode driver channel the device is wired to, 1 through 4.
    #[serde(default = "default_ldd_channel")]
    pub ldd_channel: usize,
    /// Socket address of the spectrum analyzer, e.g., `"10.10.60.150:2000"`.
    pub osa_address: String,
    /// Carrier-board access; omit when no board monitor is attached.
    #[serde(default)]
    pub zeus: Option<ZeusSection>,
}

/// SSH access to the Zeus carrier board.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZeusSection {
    /// Hostname or address of the board.
    pub host: String,
    /// SSH user name.
    pub username: String,
    /// SSH password, also used for `sudo` on the board.
    pub password: String,
    /// Fan duty cycle to apply for the run, in percent.
    #[serde(default = "default_fan_duty")]
    pub fan_duty: u8,
}

/// The sweep grid.
///
/// Omitting `temperature_stop_c` characterizes at the single temperature
/// `temperature_start_c`. Setting both `bias_coarse_stop_ma` and
/// `bias_coarse_step_ma` walks the low bias range at the coarse step before
/// switching to `bias_step_ma`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepSection {
    /// First (or only) TEC temperature, in Celsius.
    pub temperature_start_c: f64,
    /// Last TEC temperature, in Celsius.
    #[serde(default)]
    pub temperature_stop_c: Option<f64>,
    /// Temperature step, in Celsius.
    #[serde(default)]
    pub temperature_step_c: Option<f64>,
    /// First bias current, in milliamps.
    pub bias_start_ma: f64,
    /// Last bias current, in milliamps.
    pub bias_stop_ma: f64,
    /// Bias step, in milliamps.
    pub bias_step_ma: f64,
    /// Where the coarse bias segment ends, in milliamps.
    #[serde(default)]
    pub bias_coarse_stop_ma: Option<f64>,
    /// Step of the coarse bias segment, in milliamps.
    #[serde(default)]
    pub bias_coarse_step_ma: Option<f64>,
    /// Spectral sweep timeouts tolerated per point before the run fails.
    /// Omit to keep re-triggering forever.
    #[serde(default)]
    pub sweep_retry_limit: Option<usize>,
}

impl SweepSection {
    /// Build the temperature axis.
    pub fn temperature_axis(&self) -> Result<SweepAxis, RunError> {
        match (self.temperature_stop_c, self.temperature_step_c) {
            (Some(stop), Some(step)) => SweepAxis::linear(self.temperature_start_c, stop, step),
            (None, None) => Ok(SweepAxis::single(self.temperature_start_c)),
            _ => Err(RunError::InvalidConfiguration(
                "temperature_stop_c and temperature_step_c must be set together".to_string(),
            )),
        }
    }

    /// Build the bias axis.
    pub fn bias_axis(&self) -> Result<SweepAxis, RunError> {
        match (self.bias_coarse_stop_ma, self.bias_coarse_step_ma) {
            (Some(coarse_stop), Some(coarse_step)) => SweepAxis::coarse_fine(
                self.bias_start_ma,
                coarse_stop,
                coarse_step,
                self.bias_stop_ma,
                self.bias_step_ma,
            ),
            (None, None) => {
                SweepAxis::linear(self.bias_start_ma, self.bias_stop_ma, self.bias_step_ma)
            }
            _ => Err(RunError::InvalidConfiguration(
                "bias_coarse_stop_ma and bias_coarse_step_ma must be set together".to_string(),
            )),
        }
    }
}

/// Spectrum analyzer capture settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OsaSection {
    /// Start of the wavelength span, in nanometers.
    #[serde(default = "default_wavelength_start")]
    pub wavelength_start_nm: f64,
    /// End of the wavelength span, in nanometers.
    #[serde(default = "default_wavelength_stop")]
    pub wavelength_stop_nm: f64,
    /// Sampling points across the span.
    #[serde(default = "default_points")]
    pub points: usize,
    /// Wavelength resolution, in nanometers.
    #[serde(default = "default_resolution")]
    pub resolution_nm: f64,
    /// Video bandwidth, in the instrument's notation.
    #[serde(default = "default_vbw")]
    pub vbw: String,
}

impl Default for OsaSection {
    fn default() -> Self {
        OsaSection {
            wavelength_start_nm: default_wavelength_start(),
            wavelength_stop_nm: default_wavelength_stop(),
            points: default_points(),
            resolution_nm: default_resolution(),
            vbw: default_vbw(),
        }
    }
}

/// Temperature settling knobs; every field has a sensible default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettlingSection {
    /// Acceptance band around the set-point, in Celsius.
    #[serde(default = "default_tolerance")]
    pub tolerance_c: f64,
    /// Delay between temperature polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive in-band polls required.
    #[serde(default = "default_n_consecutive")]
    pub n_consecutive: usize,
    /// Poll budget before the run fails.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Dwell after settling, in seconds.
    #[serde(default = "default_settling_time_s")]
    pub settling_time_s: u64,
}

impl SettlingSection {
    /// Convert to the runtime settling configuration.
    pub fn to_config(&self) -> SettlingConfig {
        SettlingConfig {
            tolerance_c: self.tolerance_c,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            n_consecutive: self.n_consecutive,
            max_attempts: self.max_attempts,
            settling_time: Duration::from_secs(self.settling_time_s),
        }
    }
}

impl Default for SettlingSection {
    fn default() -> Self {
        SettlingSection {
            tolerance_c: default_tolerance(),
            poll_interval_ms: default_poll_interval_ms(),
            n_consecutive: default_n_consecutive(),
            max_attempts: default_max_attempts(),
            settling_time_s: default_settling_time_s(),
        }
    }
}

/// Database sink settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    /// PostgreSQL connection string.
    pub url: String,
}

/// Notification settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationSection {
    /// Incoming-webhook URL of the channel to post to.
    pub webhook_url: String,
}

fn default_ldd_channel() -> usize {
    1
}

fn default_fan_duty() -> u8 {
    90
}

fn default_wavelength_start() -> f64 {
    1565.0
}

fn default_wavelength_stop() -> f64 {
    1585.0
}

fn default_points() -> usize {
    2001
}

fn default_resolution() -> f64 {
    0.03
}

fn default_vbw() -> String {
    "1KHZ".to_string()
}

fn default_tolerance() -> f64 {
    0.1
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_n_consecutive() -> usize {
    10
}

fn default_max_attempts() -> usize {
    600
}

fn default_settling_time_s() -> u64 {
    30
}
