//! A driver for the Anritsu MS9740B optical spectrum analyzer.
//!
//! The MS9740B measures optical power versus wavelength. It is usually
//! reached over TCP/IP; the driver only needs an
//! [`instrumentlink::InstrumentLink`], so serial or GPIB-to-Ethernet bridges
//! work the same way.
//!
//! A measurement cycle looks like this: configure the wavelength span and
//! resolution once, then for each operating point trigger a
//! [`single_sweep`](Ms9740b::single_sweep), read the trace back with
//! [`read_trace`](Ms9740b::read_trace), and pull scalar analyses
//! ([`measure_peak`](Ms9740b::measure_peak),
//! [`measure_smsr`](Ms9740b::measure_smsr),
//! [`measure_linewidth`](Ms9740b::measure_linewidth)) off the captured
//! spectrum.
//!
//! Sweep completion is signalled through event status register 2. The driver
//! polls `ESR2?` on a fixed interval; if the sweep does not finish within the
//! poll budget it returns [`SweepError::TimedOut`], which callers may treat
//! as recoverable and simply re-trigger.
//!
//! # Example
//!
//! ```no_run
//! use anritsu_ms9740b::Ms9740b;
//! use instrumentlink::TcpLink;
//!
//! let link = TcpLink::connect("10.10.60.150:2000").unwrap();
//! let mut osa = Ms9740b::new(link);
//!
//! osa.set_span(1565.0, 1585.0, 2001).unwrap();
//! osa.set_resolution(0.03, "1KHZ").unwrap();
//! osa.single_sweep().unwrap();
//! let (peak_nm, peak_dbm) = osa.measure_peak().unwrap();
//! println!("peak {peak_nm} nm at {peak_dbm} dBm");
//! ```

#![deny(warnings, missing_docs)]

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use log::debug;
use thiserror::Error;

use instrumentlink::{InstrumentError, InstrumentLink};

/// Bit in `ESR2?` that signals sweep completion.
const ESR2_SWEEP_COMPLETE: u8 = 0x01;

/// Outcome of triggering a single sweep.
#[derive(Debug, Error)]
pub enum SweepError {
    /// The sweep did not report completion within the poll budget. The
    /// instrument is still healthy; re-triggering is a reasonable response.
    #[error("sweep did not complete within {polls} completion polls")]
    TimedOut {
        /// Number of `ESR2?` polls that were made.
        polls: usize,
    },
    /// Talking to the instrument failed.
    #[error(transparent)]
    Link(#[from] InstrumentError),
}

/// A driver for the Anritsu MS9740B optical spectrum analyzer.
pub struct Ms9740b<T: InstrumentLink> {
    link: Arc<Mutex<T>>,
    /// Configured wavelength span, needed to reconstruct the wavelength grid
    /// of a trace read back with `DMA?`.
    span: Option<(f64, f64, usize)>,
    sweep_poll_interval: Duration,
    sweep_max_polls: usize,
}

impl<T: InstrumentLink> Ms9740b<T> {
    /// Create a new driver instance over the given link.
    ///
    /// Sweep completion is polled every 500 ms with a budget of 60 polls;
    /// see [`set_sweep_polling`](Ms9740b::set_sweep_polling).
    pub fn new(link: T) -> Self {
        Ms9740b {
            link: Arc::new(Mutex::new(link)),
            span: None,
            sweep_poll_interval: Duration::from_millis(500),
            sweep_max_polls: 60,
        }
    }

    /// Query the instrument identification string.
    pub fn get_name(&mut self) -> Result<String, InstrumentError> {
        self.query("*IDN?")
    }

    /// Adjust the sweep completion polling interval and budget.
    pub fn set_sweep_polling(&mut self, interval: Duration, max_polls: usize) {
        self.sweep_poll_interval = interval;
        self.sweep_max_polls = max_polls;
    }

    /// Configure the wavelength span and the number of sampling points.
    ///
    /// # Arguments
    /// * `start_nm` - Start wavelength in nanometers.
    /// * `stop_nm` - Stop wavelength in nanometers; must be above the start.
    /// * `points` - Number of sampling points across the span; at least two.
    pub fn set_span(
        &mut self,
        start_nm: f64,
        stop_nm: f64,
        points: usize,
    ) -> Result<(), InstrumentError> {
        if stop_nm <= start_nm {
            return Err(InstrumentError::ValueOutOfRange {
                value: stop_nm,
                min: start_nm,
                max: f64::MAX,
            });
        }
        // The trace wavelength grid divides the span by `points - 1`.
        if points < 2 {
            return Err(InstrumentError::ValueOutOfRange {
                value: points as f64,
                min: 2.0,
                max: f64::MAX,
            });
        }
        self.sendcmd(&format!("STA {start_nm}"))?;
        self.sendcmd(&format!("STO {stop_nm}"))?;
        self.sendcmd(&format!("MPT {points}"))?;
        self.span = Some((start_nm, stop_nm, points));
        Ok(())
    }

    /// Configure the measurement resolution and video bandwidth.
    ///
    /// # Arguments
    /// * `resolution_nm` - Wavelength resolution in nanometers.
    /// * `vbw` - Video bandwidth, in the instrument's notation (e.g.,
    ///   `"1KHZ"`).
    pub fn set_resolution(&mut self, resolution_nm: f64, vbw: &str) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("RES {resolution_nm}"))?;
        self.sendcmd(&format!("VBW {vbw}"))
    }

    /// Trigger a single sweep and block until it completes.
    ///
    /// Completion is polled through `ESR2?`. If the poll budget runs out the
    /// sweep is reported as [`SweepError::TimedOut`]; the caller decides
    /// whether to re-trigger.
    pub fn single_sweep(&mut self) -> Result<(), SweepError> {
        self.sendcmd("SSI")?;
        for poll in 0..self.sweep_max_polls {
            thread::sleep(self.sweep_poll_interval);
            let response = self.query("ESR2?")?;
            let esr2: u8 = response
                .parse()
                .map_err(|_| InstrumentError::ResponseParse(response))?;
            if esr2 & ESR2_SWEEP_COMPLETE != 0 {
                debug!("sweep complete after {} polls", poll + 1);
                return Ok(());
            }
        }
        Err(SweepError::TimedOut {
            polls: self.sweep_max_polls,
        })
    }

    /// Read the captured trace from memory as `(wavelength_nm, power_dbm)`.
    ///
    /// `DMA?` returns the power samples only; the wavelength grid is
    /// reconstructed as a linear ramp across the configured span, so
    /// [`set_span`](Ms9740b::set_span) must have been called first.
    pub fn read_trace(&mut self) -> Result<(Vec<f64>, Vec<f64>), InstrumentError> {
        let (start_nm, stop_nm, points) = self.span.ok_or_else(|| {
            InstrumentError::Status("wavelength span not configured before trace read".to_string())
        })?;

        let response = self.query("DMA?")?;
        let mut power_dbm = Vec::with_capacity(points);
        for sample in response.split_whitespace() {
            let value: f64 = sample
                .parse()
                .map_err(|_| InstrumentError::ResponseParse(sample.to_string()))?;
            power_dbm.push(value);
        }
        if power_dbm.len() != points {
            return Err(InstrumentError::ResponseParse(format!(
                "expected {points} trace samples, got {}",
                power_dbm.len()
            )));
        }

        let step = (stop_nm - start_nm) / (points - 1) as f64;
        let wavelength_nm = (0..points).map(|i| start_nm + step * i as f64).collect();
        Ok((wavelength_nm, power_dbm))
    }

    /// Place the marker on the spectral peak and read it back as
    /// `(wavelength_nm, power_dbm)`.
    pub fn measure_peak(&mut self) -> Result<(f64, f64), InstrumentError> {
        self.sendcmd("PKS PEAK")?;
        let response = self.query("TMK?")?;
        let (wavelength_nm, power_dbm) = parse_value_pair(&response)?;
        Ok((wavelength_nm, power_dbm))
    }

    /// Run the side-mode suppression ratio analysis on the captured
    /// spectrum.
    ///
    /// Returns `(offset_nm, smsr_db)`: the wavelength offset of the largest
    /// side mode from the peak, and the suppression ratio itself.
    pub fn measure_smsr(&mut self) -> Result<(f64, f64), InstrumentError> {
        self.sendcmd("ANA SMSR")?;
        let response = self.query("ANAR?")?;
        parse_value_pair(&response)
    }

    /// Measure the linewidth of the peak at `delta_db` below peak power.
    ///
    /// Uses the spectrum envelope analysis (`ANA ENV`). Typical arguments
    /// are 3.0 and 20.0 for the 3 dB and 20 dB linewidths.
    pub fn measure_linewidth(&mut self, delta_db: f64) -> Result<f64, InstrumentError> {
        self.sendcmd(&format!("ANA ENV,{delta_db:.1}"))?;
        let response = self.query("ANAR?")?;
        let (_, linewidth_nm) = parse_value_pair(&response)?;
        Ok(linewidth_nm)
    }

    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let mut link = self.link.lock().expect("Mutex should not be poisoned");
        link.sendcmd(cmd)
    }

    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        let mut link = self.link.lock().expect("Mutex should not be poisoned");
        link.query(cmd)
    }
}

/// Parse a `"<value>,<value>"` analysis reply, stripping the `DBM` unit
/// suffix the instrument appends to power readings.
fn parse_value_pair(response: &str) -> Result<(f64, f64), InstrumentError> {
    let parse_err = || InstrumentError::ResponseParse(response.to_string());

    let mut parts = response.split(',');
    let first = parts.next().ok_or_else(parse_err)?;
    let second = parts.next().ok_or_else(parse_err)?;
    if parts.next().is_some() {
        return Err(parse_err());
    }

    let first: f64 = first.trim().parse().map_err(|_| parse_err())?;
    let second: f64 = second
        .trim()
        .trim_end_matches("DBM")
        .trim()
        .parse()
        .map_err(|_| parse_err())?;
    Ok((first, second))
}
