//! A driver for the Arroyo 7144 four-channel laser diode driver.
//!
//! The 7144 sources bias current into up to four laser channels and talks a
//! SCPI-style serial protocol at 38400 baud. Commands address the currently
//! selected channel, so a measurement program selects a channel once and then
//! steps the current on it.
//!
//! Setting a current is not instantaneous: the instrument ramps to the new
//! set-point and reports completion through the standard `*OPC?` event
//! query. [`Ldd7144::set_current_ma`] wraps the set-then-poll sequence.
//!
//! # Example
//!
//! ```no_run
//! use arroyo_ldd7144::{Ldd7144, SerialLinkLdd7144};
//!
//! let link = SerialLinkLdd7144::open("/dev/ttyUSB1").unwrap();
//! let mut ldd = Ldd7144::new(link);
//!
//! ldd.set_channel(1).unwrap();
//! ldd.set_output(true).unwrap();
//! ldd.set_current_ma(120.0).unwrap();
//! println!("forward voltage: {} V", ldd.get_voltage_v().unwrap());
//! ```

#![deny(warnings, missing_docs)]

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use instrumentlink::{InstrumentError, InstrumentLink, SerialLink, StreamLink};
use serialport::SerialPort;

const NUM_CHANNELS: usize = 4;

/// Delay between `*OPC?` completion polls while a current set-point ramps.
const OPC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Serial link constructor with the 7144 factory communication settings.
#[derive(Debug)]
pub struct SerialLinkLdd7144 {}

impl SerialLinkLdd7144 {
    /// Open a serial link at the 7144 default of 38400 baud, 8N1.
    ///
    /// # Arguments
    /// * `port` - The serial port name, e.g., `"/dev/ttyUSB1"` or `"COM5"`.
    pub fn open(port: &str) -> Result<StreamLink<Box<dyn SerialPort>>, InstrumentError> {
        SerialLink::open(port, 38400)
    }
}

/// A driver for the Arroyo 7144 laser diode driver.
pub struct Ldd7144<T: InstrumentLink> {
    link: Arc<Mutex<T>>,
}

impl<T: InstrumentLink> Ldd7144<T> {
    /// Create a new driver instance over the given link.
    pub fn new(link: T) -> Self {
        Ldd7144 {
            link: Arc::new(Mutex::new(link)),
        }
    }

    /// Query the instrument identification string.
    pub fn get_name(&mut self) -> Result<String, InstrumentError> {
        self.query("*IDN?")
    }

    /// Select the laser channel (1 through 4) that subsequent commands
    /// address.
    pub fn set_channel(&mut self, channel: usize) -> Result<(), InstrumentError> {
        if !(1..=NUM_CHANNELS).contains(&channel) {
            return Err(InstrumentError::ChannelOutOfRange {
                idx: channel,
                channels: NUM_CHANNELS,
            });
        }
        self.sendcmd(&format!("LAS:CHAN {channel}"))
    }

    /// Set the bias current in milliamps and wait for the ramp to finish.
    ///
    /// The current must be non-negative. Completion is polled through
    /// `*OPC?` every 100 ms.
    pub fn set_current_ma(&mut self, current_ma: f64) -> Result<(), InstrumentError> {
        if !current_ma.is_finite() || current_ma < 0.0 {
            return Err(InstrumentError::ValueOutOfRange {
                value: current_ma,
                min: 0.0,
                max: f64::MAX,
            });
        }
        self.sendcmd(&format!("LAS:LDI {current_ma:.1}"))?;
        while !self.operation_complete()? {
            thread::sleep(OPC_POLL_INTERVAL);
        }
        Ok(())
    }

    /// Read back the actual bias current in milliamps.
    pub fn get_current_ma(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64("LAS:LDI?")
    }

    /// Read the laser forward voltage in volts.
    pub fn get_voltage_v(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64("LAS:LDV?")
    }

    /// Enable or disable the laser output stage.
    pub fn set_output(&mut self, enabled: bool) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("LAS:OUT {}", enabled as u8))
    }

    /// Whether the laser output stage is enabled.
    pub fn get_output(&mut self) -> Result<bool, InstrumentError> {
        let response = self.query("LAS:OUT?")?;
        match response.as_str() {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(InstrumentError::ResponseParse(response)),
        }
    }

    /// Whether the operation-complete bit is set in the event status
    /// register.
    pub fn operation_complete(&mut self) -> Result<bool, InstrumentError> {
        let response = self.query("*OPC?")?;
        Ok(response == "1")
    }

    fn query_f64(&mut self, cmd: &str) -> Result<f64, InstrumentError> {
        let response = self.query(cmd)?;
        response
            .parse()
            .map_err(|_| InstrumentError::ResponseParse(response))
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
