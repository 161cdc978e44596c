//! Capability traits the sweep logic talks to, plus their driver adapters.
//!
//! The acquisition and sweep code never names a concrete instrument. Each
//! role it needs is a small trait here, implemented for the real drivers
//! below and for in-memory fakes in the test suite.

use measurements::Temperature;

use anritsu_ms9740b::{Ms9740b, SweepError};
use arroyo_ldd7144::Ldd7144;
use arroyo_tec5240::Tec5240;
use instrumentlink::{InstrumentError, InstrumentLink};
use zeus_controller::ZeusController;

/// Outcome of triggering one spectral sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStatus {
    /// The sweep finished and a trace is in memory.
    Complete,
    /// The sweep did not finish within the instrument driver's poll budget.
    /// The instrument is healthy and may simply be re-triggered.
    TimedOut,
}

/// Something that sources bias current into the device under test.
pub trait BiasSource {
    /// Set the bias current in milliamps and wait until it is reached.
    fn set_bias_ma(&mut self, current_ma: f64) -> Result<(), InstrumentError>;
    /// Read back the actual bias current in milliamps.
    fn get_bias_ma(&mut self) -> Result<f64, InstrumentError>;
    /// Read the forward voltage in volts.
    fn get_voltage_v(&mut self) -> Result<f64, InstrumentError>;
    /// Enable or disable the output stage.
    fn set_output(&mut self, enabled: bool) -> Result<(), InstrumentError>;
}

/// Something that holds the device under test at a temperature.
pub trait TemperatureController {
    /// Set the temperature set-point.
    fn set_temperature(&mut self, setpoint: Temperature) -> Result<(), InstrumentError>;
    /// Read the measured temperature.
    fn get_temperature(&mut self) -> Result<Temperature, InstrumentError>;
    /// Enable or disable the controller output stage.
    fn set_output(&mut self, enabled: bool) -> Result<(), InstrumentError>;
}

/// Something that captures optical spectra and derived scalar metrics.
pub trait SpectrumAnalyzer {
    /// Trigger a sweep and block until it completes or times out.
    fn single_sweep(&mut self) -> Result<SweepStatus, InstrumentError>;
    /// Read the captured trace as `(wavelength_nm, power_dbm)`.
    fn read_trace(&mut self) -> Result<(Vec<f64>, Vec<f64>), InstrumentError>;
    /// Locate the spectral peak as `(wavelength_nm, power_dbm)`.
    fn measure_peak(&mut self) -> Result<(f64, f64), InstrumentError>;
    /// Side-mode suppression analysis as `(offset_nm, smsr_db)`.
    fn measure_smsr(&mut self) -> Result<(f64, f64), InstrumentError>;
    /// Linewidth at `delta_db` below the peak, in nanometers.
    fn measure_linewidth(&mut self, delta_db: f64) -> Result<f64, InstrumentError>;
}

/// Auxiliary telemetry from the light-engine carrier board.
pub trait AuxMonitor {
    /// Board temperatures as `(ambient_c, light_engine_c)`.
    fn get_temperatures(&mut self) -> Result<(f64, f64), InstrumentError>;
    /// Monitor-photodiode current of one channel, in milliamps.
    fn get_mpd_ma(&mut self, channel: usize) -> Result<f64, InstrumentError>;
    /// Drive every channel on the board to zero current.
    fn zero_all_channels(&mut self) -> Result<(), InstrumentError>;
}

impl<T: InstrumentLink> BiasSource for Ldd7144<T> {
    fn set_bias_ma(&mut self, current_ma: f64) -> Result<(), InstrumentError> {
        self.set_current_ma(current_ma)
    }

    fn get_bias_ma(&mut self) -> Result<f64, InstrumentError> {
        self.get_current_ma()
    }

    fn get_voltage_v(&mut self) -> Result<f64, InstrumentError> {
        Ldd7144::get_voltage_v(self)
    }

    fn set_output(&mut self, enabled: bool) -> Result<(), InstrumentError> {
        Ldd7144::set_output(self, enabled)
    }
}

impl<T: InstrumentLink> TemperatureController for Tec5240<T> {
    fn set_temperature(&mut self, setpoint: Temperature) -> Result<(), InstrumentError> {
        Tec5240::set_temperature(self, setpoint)
    }

    fn get_temperature(&mut self) -> Result<Temperature, InstrumentError> {
        Tec5240::get_temperature(self)
    }

    fn set_output(&mut self, enabled: bool) -> Result<(), InstrumentError> {
        Tec5240::set_output(self, enabled)
    }
}

impl<T: InstrumentLink> SpectrumAnalyzer for Ms9740b<T> {
    fn single_sweep(&mut self) -> Result<SweepStatus, InstrumentError> {
        match Ms9740b::single_sweep(self) {
            Ok(()) => Ok(SweepStatus::Complete),
            Err(SweepError::TimedOut { .. }) => Ok(SweepStatus::TimedOut),
            Err(SweepError::Link(err)) => Err(err),
        }
    }

    fn read_trace(&mut self) -> Result<(Vec<f64>, Vec<f64>), InstrumentError> {
        Ms9740b::read_trace(self)
    }

    fn measure_peak(&mut self) -> Result<(f64, f64), InstrumentError> {
        Ms9740b::measure_peak(self)
    }

    fn measure_smsr(&mut self) -> Result<(f64, f64), InstrumentError> {
        Ms9740b::measure_smsr(self)
    }

    fn measure_linewidth(&mut self, delta_db: f64) -> Result<f64, InstrumentError> {
        Ms9740b::measure_linewidth(self, delta_db)
    }
}

impl<T: InstrumentLink> AuxMonitor for ZeusController<T> {
    fn get_temperatures(&mut self) -> Result<(f64, f64), InstrumentError> {
        ZeusController::get_temperatures(self)
    }

    fn get_mpd_ma(&mut self, channel: usize) -> Result<f64, InstrumentError> {
        ZeusController::get_mpd_ma(self, channel)
    }

    fn zero_all_channels(&mut self) -> Result<(), InstrumentError> {
        ZeusController::zero_all_channels(self)
    }
}

/// The instrument set one characterization run drives.
///
/// The board monitor is optional; without it the board telemetry fields of
/// the record are `NaN` and the board-side shutdown step is skipped.
pub struct Instruments<'a> {
    /// Bias current source for the channel under test.
    pub bias: &'a mut dyn BiasSource,
    /// Temperature controller holding the device.
    pub tec: &'a mut dyn TemperatureController,
    /// Spectrum analyzer on the channel's output fiber.
    pub osa: &'a mut dyn SpectrumAnalyzer,
    /// Carrier-board telemetry, when attached.
    pub aux: Option<&'a mut dyn AuxMonitor>,
}
