//! A driver for the Arroyo 5240 TEC source temperature controller.
//!
//! The 5240 holds a device at a target temperature through a thermoelectric
//! cooler and talks a SCPI-style serial protocol at 38400 baud.
//!
//! # Example
//!
//! ```no_run
//! use arroyo_tec5240::{SerialLinkTec5240, Tec5240};
//! use measurements::Temperature;
//!
//! let link = SerialLinkTec5240::open("/dev/ttyUSB0").unwrap();
//! let mut tec = Tec5240::new(link);
//!
//! tec.set_temperature(Temperature::from_celsius(25.0)).unwrap();
//! tec.set_output(true).unwrap();
//! println!("{:.3} C", tec.get_temperature().unwrap().as_celsius());
//! ```

#![deny(warnings, missing_docs)]

use std::sync::{Arc, Mutex};

use instrumentlink::{InstrumentError, InstrumentLink, SerialLink, StreamLink};
use measurements::Temperature;
use serialport::SerialPort;

/// Serial link constructor with the 5240 factory communication settings.
#[derive(Debug)]
pub struct SerialLinkTec5240 {}

impl SerialLinkTec5240 {
    /// Open a serial link at the 5240 default of 38400 baud, 8N1.
    ///
    /// # Arguments
    /// * `port` - The serial port name, e.g., `"/dev/ttyUSB0"` or `"COM7"`.
    pub fn open(port: &str) -> Result<StreamLink<Box<dyn SerialPort>>, InstrumentError> {
        SerialLink::open(port, 38400)
    }
}

/// A driver for the Arroyo 5240 TEC source.
pub struct Tec5240<T: InstrumentLink> {
    link: Arc<Mutex<T>>,
}

impl<T: InstrumentLink> Tec5240<T> {
    /// Create a new driver instance over the given link.
    pub fn new(link: T) -> Self {
        Tec5240 {
            link: Arc::new(Mutex::new(link)),
        }
    }

    /// Query the instrument identification string.
    pub fn get_name(&mut self) -> Result<String, InstrumentError> {
        self.query("*IDN?")
    }

    /// Set the temperature set-point.
    pub fn set_temperature(&mut self, setpoint: Temperature) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("TEC:T {:.3}", setpoint.as_celsius()))
    }

    /// Read the actual (measured) temperature.
    ///
    /// Note that `TEC:T?` reports the measured temperature, not the
    /// set-point.
    pub fn get_temperature(&mut self) -> Result<Temperature, InstrumentError> {
        let response = self.query("TEC:T?")?;
        let celsius: f64 = response
            .parse()
            .map_err(|_| InstrumentError::ResponseParse(response))?;
        Ok(Temperature::from_celsius(celsius))
    }

    /// Enable or disable the TEC output stage.
    pub fn set_output(&mut self, enabled: bool) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("TEC:OUT {}", enabled as u8))
    }

    /// Whether the TEC output stage is enabled.
    pub fn get_output(&mut self) -> Result<bool, InstrumentError> {
        let response = self.query("TEC:OUT?")?;
        match response.as_str() {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(InstrumentError::ResponseParse(response)),
        }
    }

    /// Read the control-loop PID constants as `(p, i, d)`.
    pub fn get_pid(&mut self) -> Result<(f64, f64, f64), InstrumentError> {
        let response = self.query("TEC:PID?")?;
        let parts: Vec<&str> = response.split(',').collect();
        if parts.len() != 3 {
            return Err(InstrumentError::ResponseParse(response));
        }
        let mut values = [0.0f64; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| InstrumentError::ResponseParse(response.clone()))?;
        }
        Ok((values[0], values[1], values[2]))
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
