//! [`InstrumentLink`] over any blocking byte stream.
//!
//! [`StreamLink`] wraps anything that implements [`std::io::Read`] and
//! [`std::io::Write`]. Constructors are provided for TCP sockets and, behind
//! the `serial` feature, serial ports; an SSH channel or any other stream
//! type can be wrapped directly with [`StreamLink::new`].

use std::{
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::{InstrumentError, InstrumentLink};

/// A link over an arbitrary blocking byte stream.
///
/// The stream itself is responsible for honoring read timeouts; the
/// constructors below configure that where the transport supports it.
pub struct StreamLink<P: Read + Write> {
    port: P,
    terminator: String,
    command_terminator: String,
    timeout: Duration,
}

impl<P: Read + Write> StreamLink<P> {
    /// Wrap an already-open stream.
    pub fn new(port: P, timeout: Duration) -> Self {
        StreamLink {
            port,
            terminator: "\n".to_string(),
            command_terminator: "\n".to_string(),
            timeout,
        }
    }

    /// Consume the link and hand back the underlying stream.
    pub fn into_inner(self) -> P {
        self.port
    }
}

impl<P: Read + Write> InstrumentLink for StreamLink<P> {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        self.port.read_exact(buf)?;
        Ok(())
    }

    fn terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn command_terminator(&self) -> &str {
        self.command_terminator.as_str()
    }

    fn set_command_terminator(&mut self, terminator: &str) {
        self.command_terminator = terminator.to_string();
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Constructors for instrument links over TCP sockets.
#[derive(Debug)]
pub struct TcpLink {}

impl TcpLink {
    /// Connect to an instrument listening on a TCP socket.
    ///
    /// A read/write timeout of three seconds is applied so that a dead
    /// instrument cannot block the control program forever; use
    /// [`TcpLink::connect_with_timeout`] to pick something else.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<StreamLink<TcpStream>, InstrumentError> {
        Self::connect_with_timeout(addr, Duration::from_secs(3))
    }

    /// Connect with an explicit read/write timeout.
    pub fn connect_with_timeout<A: ToSocketAddrs>(
        addr: A,
        timeout: Duration,
    ) -> Result<StreamLink<TcpStream>, InstrumentError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(StreamLink::new(stream, timeout))
    }
}

/// Constructors for instrument links over serial ports.
#[cfg(feature = "serial")]
#[derive(Debug)]
pub struct SerialLink {}

#[cfg(feature = "serial")]
impl SerialLink {
    /// Open a serial port with 8N1 framing and a three second timeout.
    ///
    /// # Arguments
    /// * `port` - The port name, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud_rate` - The baud rate the instrument is configured for.
    pub fn open(
        port: &str,
        baud_rate: u32,
    ) -> Result<StreamLink<Box<dyn serialport::SerialPort>>, InstrumentError> {
        let timeout = Duration::from_secs(3);
        Self::open_with(serialport::new(port, baud_rate).timeout(timeout))
    }

    /// Open a serial port from a fully configured builder, for instruments
    /// that need non-default parity, stop bits, or timeouts.
    pub fn open_with(
        builder: serialport::SerialPortBuilder,
    ) -> Result<StreamLink<Box<dyn serialport::SerialPort>>, InstrumentError> {
        let port = builder.open()?;
        let timeout = port.timeout();
        Ok(StreamLink::new(port, timeout))
    }
}
