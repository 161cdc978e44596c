//! Temperature settling and single-point acquisition.

use std::{thread, time::Duration};

use chrono::Local;
use log::{debug, info, warn};
use measurements::Temperature;

use instrumentlink::InstrumentError;

use crate::{
    error::RunError,
    instruments::{Instruments, SweepStatus},
    record::{dbm_to_uw, MeasurementRecord},
};

/// Peak power below which the side-mode and linewidth analyses are skipped.
///
/// Under threshold the spectrum is broadband spontaneous emission and the
/// analyses return garbage, so the extended metrics are left empty instead.
pub const EXTENDED_METRICS_GATE_DBM: f64 = -30.0;

/// Attempts for a single in-point instrument readback before the failure is
/// escalated.
const READBACK_ATTEMPTS: usize = 3;

/// How the suite decides that the device temperature has settled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlingConfig {
    /// Acceptance band around the set-point, in Celsius.
    pub tolerance_c: f64,
    /// Delay between temperature polls.
    pub poll_interval: Duration,
    /// Consecutive in-band polls required before the device counts as
    /// settled.
    pub n_consecutive: usize,
    /// Poll budget; running out of it fails the run.
    pub max_attempts: usize,
    /// Extra dwell after the temperature has settled, to let the optics
    /// thermalize.
    pub settling_time: Duration,
}

impl Default for SettlingConfig {
    fn default() -> Self {
        SettlingConfig {
            tolerance_c: 0.1,
            poll_interval: Duration::from_millis(500),
            n_consecutive: 10,
            max_attempts: 600,
            settling_time: Duration::from_secs(30),
        }
    }
}

/// Outcome of waiting for the temperature to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The device reached and held the set-point.
    Settled,
    /// A cancellation request arrived while waiting.
    Cancelled,
}

/// Outcome of measuring one operating point.
#[derive(Debug, PartialEq)]
pub enum AcquireOutcome {
    /// The point was measured.
    Measured(MeasurementRecord),
    /// A cancellation request arrived between sweep re-triggers.
    Cancelled,
}

/// Captures one fully-described operating point of the device under test.
///
/// The step owns the instrument handles for the duration of the run and is
/// the only code that talks to them; the sweep controller above it deals in
/// set-points and records only.
pub struct AcquisitionStep<'a> {
    instruments: Instruments<'a>,
    settling: SettlingConfig,
    /// Spectral sweep timeouts tolerated per point; `None` retries forever.
    sweep_retry_limit: Option<usize>,
    light_engine_id: String,
    channel: usize,
}

impl<'a> AcquisitionStep<'a> {
    /// Create a step for one channel of one device, with default settling
    /// behavior and an unbounded sweep re-trigger budget.
    pub fn new(
        instruments: Instruments<'a>,
        light_engine_id: impl Into<String>,
        channel: usize,
    ) -> Self {
        AcquisitionStep {
            instruments,
            settling: SettlingConfig::default(),
            sweep_retry_limit: None,
            light_engine_id: light_engine_id.into(),
            channel,
        }
    }

    /// Replace the settling configuration.
    pub fn with_settling(mut self, settling: SettlingConfig) -> Self {
        self.settling = settling;
        self
    }

    /// Bound the number of spectral sweep timeouts tolerated per point.
    pub fn with_sweep_retry_limit(mut self, limit: Option<usize>) -> Self {
        self.sweep_retry_limit = limit;
        self
    }

    /// Drive the TEC to `target` and wait until the device holds it.
    ///
    /// The measured temperature must stay within the tolerance band for
    /// `n_consecutive` polls in a row; one out-of-band reading resets the
    /// count. After settling, the configured dwell is slept before
    /// returning. `should_cancel` is checked before every poll.
    pub fn settle_temperature(
        &mut self,
        target: Temperature,
        should_cancel: &mut dyn FnMut() -> bool,
    ) -> Result<SettleOutcome, RunError> {
        let target_c = target.as_celsius();
        info!("settling at {target_c:.1} C");
        self.instruments.tec.set_temperature(target)?;
        self.instruments.tec.set_output(true)?;

        let mut in_band = 0;
        for attempt in 1..=self.settling.max_attempts {
            if should_cancel() {
                return Ok(SettleOutcome::Cancelled);
            }
            thread::sleep(self.settling.poll_interval);
            let measured_c = self.instruments.tec.get_temperature()?.as_celsius();
            if (measured_c - target_c).abs() <= self.settling.tolerance_c {
                in_band += 1;
            } else {
                in_band = 0;
            }
            if in_band >= self.settling.n_consecutive {
                debug!("settled at {measured_c:.3} C after {attempt} polls");
                thread::sleep(self.settling.settling_time);
                return Ok(SettleOutcome::Settled);
            }
        }
        Err(RunError::SettlingFailed {
            target_c,
            attempts: self.settling.max_attempts,
        })
    }

    /// Measure one operating point at the given bias current.
    ///
    /// Sets the bias, reads the electrical and board telemetry, captures a
    /// spectrum (re-triggering on sweep timeouts), and derives the scalar
    /// metrics. The extended metrics are only measured when the peak power
    /// clears [`EXTENDED_METRICS_GATE_DBM`]. `should_cancel` is checked
    /// between sweep re-triggers, so an endlessly timing-out analyzer
    /// cannot pin the run.
    pub fn acquire(
        &mut self,
        bias_ma: f64,
        should_cancel: &mut dyn FnMut() -> bool,
    ) -> Result<AcquireOutcome, RunError> {
        self.instruments.bias.set_bias_ma(bias_ma)?;
        let now = Local::now();

        let bias = &mut self.instruments.bias;
        let bias_current_ma = with_retries("bias current readback", || bias.get_bias_ma())?;
        let voltage_v = with_retries("forward voltage readback", || bias.get_voltage_v())?;
        let tec_temp_c = self.instruments.tec.get_temperature()?.as_celsius();

        let (ambient_temp_c, light_engine_temp_c, mpd_ma) = match &mut self.instruments.aux {
            Some(aux) => {
                let (ambient_c, light_engine_c) = aux.get_temperatures()?;
                let mpd_ma = aux.get_mpd_ma(self.channel)?;
                (ambient_c, light_engine_c, mpd_ma)
            }
            None => (f64::NAN, f64::NAN, f64::NAN),
        };

        let mut timeouts = 0;
        loop {
            match self.instruments.osa.single_sweep()? {
                SweepStatus::Complete => break,
                SweepStatus::TimedOut => {
                    timeouts += 1;
                    if let Some(limit) = self.sweep_retry_limit {
                        if timeouts > limit {
                            return Err(RunError::SweepTimeout { attempts: timeouts });
                        }
                    }
                    if should_cancel() {
                        return Ok(AcquireOutcome::Cancelled);
                    }
                    warn!("spectral sweep timed out, re-triggering (timeout {timeouts})");
                }
            }
        }

        let (wavelength_nm, power_dbm) = self.instruments.osa.read_trace()?;
        let power_uw = power_dbm.iter().copied().map(dbm_to_uw).collect();
        let (peak_wavelength_nm, peak_power_dbm) = self.instruments.osa.measure_peak()?;

        let mut record = MeasurementRecord {
            light_engine_id: self.light_engine_id.clone(),
            channel: self.channel,
            date: now.date_naive(),
            time: now.time(),
            bias_current_ma,
            voltage_v,
            tec_temp_c,
            ambient_temp_c,
            light_engine_temp_c,
            mpd_ma,
            wavelength_nm,
            power_dbm,
            power_uw,
            peak_wavelength_nm,
            peak_power_dbm,
            smsr_db: None,
            smsr_offset_nm: None,
            linewidth_3db_nm: None,
            linewidth_20db_nm: None,
        };

        if peak_power_dbm > EXTENDED_METRICS_GATE_DBM {
            let (offset_nm, smsr_db) = self.instruments.osa.measure_smsr()?;
            record.smsr_offset_nm = Some(offset_nm);
            record.smsr_db = Some(smsr_db);
            record.linewidth_3db_nm = Some(self.instruments.osa.measure_linewidth(3.0)?);
            record.linewidth_20db_nm = Some(self.instruments.osa.measure_linewidth(20.0)?);
        }
        Ok(AcquireOutcome::Measured(record))
    }

    /// Put every instrument into a safe state, best effort.
    ///
    /// Runs unconditionally at the end of a run, whatever its outcome.
    /// Failures are logged and do not stop the remaining steps.
    pub fn shutdown(&mut self, safe_temperature: Temperature) {
        info!("returning instruments to a safe state");
        if let Err(err) = self.instruments.bias.set_bias_ma(0.0) {
            warn!("could not zero the bias current: {err}");
        }
        if let Err(err) = self.instruments.bias.set_output(false) {
            warn!("could not disable the bias output: {err}");
        }
        if let Some(aux) = &mut self.instruments.aux {
            if let Err(err) = aux.zero_all_channels() {
                warn!("could not zero the board channels: {err}");
            }
        }
        if let Err(err) = self.instruments.tec.set_temperature(safe_temperature) {
            warn!("could not reset the TEC set-point: {err}");
        }
        if let Err(err) = self.instruments.tec.set_output(false) {
            warn!("could not disable the TEC output: {err}");
        }
    }
}

/// Run an in-point readback, retrying communication hiccups a few times
/// before letting the error escalate.
fn with_retries<T>(
    what: &str,
    mut op: impl FnMut() -> Result<T, InstrumentError>,
) -> Result<T, InstrumentError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < READBACK_ATTEMPTS => {
                warn!("{what} failed on attempt {attempt}: {err}");
            }
            Err(err) => return Err(err),
        }
    }
}
