//! A driver for the Zeus light-engine carrier board.
//!
//! Zeus is an FPGA carrier board that exposes its control library through a
//! Python REPL reached over SSH. There is no clean wire protocol: commands
//! are Python expressions, and results come back as whatever the board
//! library prints, echo lines and all. This crate keeps every bit of that
//! text scraping behind a typed API so nothing downstream ever sees a shell
//! prompt.
//!
//! The driver itself only needs an [`instrumentlink::InstrumentLink`] whose
//! responses end with the REPL prompt; the `ssh` feature provides
//! [`ZeusSession`], which logs in over SSH and brings the REPL up.
//!
//! # Example
//!
//! Any link whose responses end with the REPL prompt works; in practice
//! that link comes from `ZeusSession::connect` (behind the `ssh` feature).
//!
//! ```no_run
//! use instrumentlink::TcpLink;
//! use zeus_controller::ZeusController;
//!
//! let link = TcpLink::connect("pynq1:2222").unwrap();
//! let mut zeus = ZeusController::new(link);
//!
//! zeus.set_fan_duty(90).unwrap();
//! zeus.set_laser_ma(3, 150.0).unwrap();
//! let (ambient_c, le_c) = zeus.get_temperatures().unwrap();
//! println!("ambient {ambient_c} C, light engine {le_c} C");
//! ```

#![deny(warnings, missing_docs)]

#[cfg(feature = "ssh")]
mod session;

#[cfg(feature = "ssh")]
pub use session::ZeusSession;

use instrumentlink::{InstrumentError, InstrumentLink};

/// The Python REPL prompt, used as the link terminator.
const PROMPT: &str = ">>> ";

/// Number of light-engine channels on the board.
const NUM_CHANNELS: usize = 8;

/// A driver for the Zeus board's light-engine control library.
pub struct ZeusController<T: InstrumentLink> {
    link: T,
}

impl<T: InstrumentLink> ZeusController<T> {
    /// Create a new driver over a link whose far end is the board's Python
    /// REPL.
    pub fn new(mut link: T) -> Self {
        link.set_terminator(PROMPT);
        ZeusController { link }
    }

    /// Set the bias current of one light-engine channel in milliamps.
    ///
    /// # Arguments
    /// * `channel` - Light-engine channel, 0 through 7.
    /// * `current_ma` - Bias current in milliamps.
    pub fn set_laser_ma(&mut self, channel: usize, current_ma: f64) -> Result<(), InstrumentError> {
        self.check_channel(channel)?;
        self.repl_query(&format!(
            "light_engine.set_laser_ma(LEChannel.LE{channel},{current_ma})"
        ))?;
        Ok(())
    }

    /// Drive every light-engine channel to zero current.
    pub fn zero_all_channels(&mut self) -> Result<(), InstrumentError> {
        for channel in 0..NUM_CHANNELS {
            self.set_laser_ma(channel, 0.0)?;
        }
        Ok(())
    }

    /// Set the light-engine fan duty cycle in percent.
    pub fn set_fan_duty(&mut self, percent: u8) -> Result<(), InstrumentError> {
        if percent > 100 {
            return Err(InstrumentError::ValueOutOfRange {
                value: percent as f64,
                min: 0.0,
                max: 100.0,
            });
        }
        self.repl_query(&format!("fan.set_le_duty_cycle({percent})"))?;
        Ok(())
    }

    /// Read the board's ambient and light-engine temperatures in Celsius as
    /// `(ambient_c, light_engine_c)`.
    pub fn get_temperatures(&mut self) -> Result<(f64, f64), InstrumentError> {
        let output = self.repl_query("temperature.print_all()")?;
        let temps: Vec<f64> = output
            .split_whitespace()
            .filter_map(|token| token.strip_suffix("\u{b0}C"))
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| InstrumentError::ResponseParse(output.clone()))?;
        match temps.as_slice() {
            [ambient_c, light_engine_c, ..] => Ok((*ambient_c, *light_engine_c)),
            _ => Err(InstrumentError::ResponseParse(output)),
        }
    }

    /// Read the monitor-photodiode current of one channel in milliamps.
    pub fn get_mpd_ma(&mut self, channel: usize) -> Result<f64, InstrumentError> {
        self.check_channel(channel)?;
        let output = self.repl_query(&format!("adc.LE_MPD_IMON_{channel}.print()"))?;
        // Reply shape: "LE_MPD_IMON_3: 1.234mA"
        let token = output
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| InstrumentError::ResponseParse(output.clone()))?;
        token
            .trim_end_matches(|c: char| c.is_alphabetic())
            .parse()
            .map_err(|_| InstrumentError::ResponseParse(output.clone()))
    }

    fn check_channel(&self, channel: usize) -> Result<(), InstrumentError> {
        if channel >= NUM_CHANNELS {
            return Err(InstrumentError::ChannelOutOfRange {
                idx: channel,
                channels: NUM_CHANNELS,
            });
        }
        Ok(())
    }

    /// Send one Python expression and return its printed output with the
    /// echoed command line stripped.
    fn repl_query(&mut self, expr: &str) -> Result<String, InstrumentError> {
        let raw = self.link.query(expr)?;
        let output = raw.strip_prefix(expr).unwrap_or(&raw);
        Ok(output.trim().to_string())
    }
}
