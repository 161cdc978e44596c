//! Blocking text-protocol links to laboratory instruments.
//!
//! Most bench equipment speaks a line-oriented command/response protocol
//! (SCPI or something SCPI-shaped): the host writes a command terminated by a
//! newline-class sequence, and the instrument answers with a terminated text
//! line. This crate provides the [`InstrumentLink`] trait that captures that
//! exchange, a generic [`StreamLink`] implementation that works over anything
//! implementing [`std::io::Read`] and [`std::io::Write`] (a serial port, a
//! TCP socket, an SSH channel), and a [`ScriptedLink`] test double that lets
//! driver crates test their full command grammar without hardware.
//!
//! Every driver built on this crate returns [`InstrumentError`], so errors
//! propagate through a measurement program with the `?` operator.
//!
//! # Example
//!
//! ```no_run
//! use instrumentlink::{InstrumentLink, TcpLink};
//!
//! let mut link = TcpLink::connect("10.10.60.150:2000").unwrap();
//! let idn = link.query("*IDN?").unwrap();
//! println!("connected to {idn}");
//! ```

#![warn(missing_docs)]

mod scripted;
mod stream;

pub use scripted::ScriptedLink;
pub use stream::{StreamLink, TcpLink};
#[cfg(feature = "serial")]
pub use stream::SerialLink;

use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors shared by all instrument links and the drivers built on them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstrumentError {
    /// A channel index was requested that the instrument does not have.
    #[error("channel {idx} is out of range, instrument has {channels} channels")]
    ChannelOutOfRange {
        /// The requested channel index.
        idx: usize,
        /// The number of channels the instrument actually has.
        channels: usize,
    },
    /// A set-point is outside the range the instrument accepts.
    #[error("value {value} is out of range, allowed range is [{min}, {max}]")]
    ValueOutOfRange {
        /// The rejected value.
        value: f64,
        /// Lower bound of the accepted range.
        min: f64,
        /// Upper bound of the accepted range.
        max: f64,
    },
    /// The instrument answered, but the reply did not have the expected
    /// shape. The raw reply is carried for diagnostics.
    #[error("could not parse instrument response: {0:?}")]
    ResponseParse(String),
    /// The instrument reported an error condition of its own.
    #[error("{0}")]
    Status(String),
    /// Reading or writing the underlying byte stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// No terminated response arrived within the link timeout.
    #[error("timed out after {0:?} waiting for a response")]
    Timeout(Duration),
    /// Like [`InstrumentError::Timeout`], but annotated with the query that
    /// went unanswered.
    #[error("query {query:?} timed out after {timeout:?}")]
    QueryTimeout {
        /// The command that was sent.
        query: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },
    /// Opening or configuring a serial port failed.
    #[cfg(feature = "serial")]
    #[error(transparent)]
    Serial(#[from] serialport::Error),
}

/// A blocking command/response link to one instrument.
///
/// Implementors provide the raw byte operations plus terminator storage; the
/// command-level methods ([`sendcmd`](InstrumentLink::sendcmd),
/// [`query`](InstrumentLink::query),
/// [`read_until_terminator`](InstrumentLink::read_until_terminator)) are
/// derived from those and normally do not need to be overridden.
pub trait InstrumentLink {
    /// Write raw bytes to the instrument and flush them out.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError>;

    /// Read exactly `buf.len()` bytes from the instrument.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError>;

    /// The terminator expected at the end of responses. Defaults to `"\n"`.
    fn terminator(&self) -> &str {
        "\n"
    }

    /// Change the response terminator. Drivers call this once at
    /// construction when their instrument uses something other than `"\n"`.
    fn set_terminator(&mut self, terminator: &str);

    /// The terminator appended to outgoing commands. Defaults to `"\n"`.
    ///
    /// Most instruments frame both directions the same way, but interactive
    /// protocols differ: a REPL takes newline-terminated input and answers
    /// with a prompt, so the response terminator is not the command framing.
    fn command_terminator(&self) -> &str {
        "\n"
    }

    /// Change the command terminator.
    fn set_command_terminator(&mut self, terminator: &str);

    /// How long [`read_until_terminator`](InstrumentLink::read_until_terminator)
    /// waits for a complete response. Defaults to three seconds.
    fn timeout(&self) -> Duration {
        Duration::from_secs(3)
    }

    /// Send one command, command terminator appended.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let framed = format!("{cmd}{}", self.command_terminator());
        self.write_raw(framed.as_bytes())
    }

    /// Read byte-wise until the terminator arrives, then return the response
    /// with the terminator and surrounding whitespace stripped.
    ///
    /// Bytes that are not valid UTF-8 are dropped with a log message rather
    /// than aborting the read; instruments occasionally emit garbage on
    /// power-up.
    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        let mut response = String::new();
        let mut byte = [0u8; 1];
        let deadline = Instant::now() + self.timeout();

        while Instant::now() < deadline {
            self.read_exact(&mut byte)?;
            match str::from_utf8(&byte) {
                Ok(s) => response.push_str(s),
                Err(_) => log::debug!("dropping non-UTF-8 byte from instrument: {byte:?}"),
            }
            if response.ends_with(self.terminator()) {
                let stripped = &response[..response.len() - self.terminator().len()];
                return Ok(stripped.trim().to_string());
            }
        }
        Err(InstrumentError::Timeout(self.timeout()))
    }

    /// Send a command and read back one terminated response.
    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        self.sendcmd(cmd)?;
        self.read_until_terminator().map_err(|err| match err {
            InstrumentError::Timeout(timeout) => InstrumentError::QueryTimeout {
                query: cmd.to_string(),
                timeout,
            },
            other => other,
        })
    }
}
