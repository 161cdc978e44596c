//! SSH session bring-up for the Zeus board.

use std::{io, net::TcpStream, time::Duration};

use log::debug;
use ssh2::Session;

use instrumentlink::{InstrumentError, InstrumentLink, StreamLink};

/// Root-shell prompt seen after `sudo -i` on the board.
const ROOT_PROMPT: &str = "# ";
/// Python REPL prompt.
const PYTHON_PROMPT: &str = ">>> ";

fn ssh_err(err: ssh2::Error) -> InstrumentError {
    InstrumentError::Io(io::Error::other(err))
}

/// Connector that logs into the Zeus board and brings its Python REPL up.
#[derive(Debug)]
pub struct ZeusSession {}

impl ZeusSession {
    /// Open an SSH session to the board and return a link to its Python
    /// REPL.
    ///
    /// Performs the full bring-up the board needs before it accepts
    /// light-engine commands: password login, a root shell, the PYNQ
    /// virtualenv, a `python3` REPL, and the board control library import
    /// and power initialization.
    ///
    /// # Arguments
    /// * `host` - Hostname or address of the board, e.g., `"pynq1"`.
    /// * `username` - SSH user name.
    /// * `password` - SSH password, also used for `sudo`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use zeus_controller::{ZeusController, ZeusSession};
    ///
    /// let link = ZeusSession::connect("pynq1", "xilinx", "xilinx").unwrap();
    /// let mut zeus = ZeusController::new(link);
    /// zeus.set_fan_duty(90).unwrap();
    /// ```
    pub fn connect(
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<StreamLink<ssh2::Channel>, InstrumentError> {
        let tcp = TcpStream::connect((host, 22))?;
        let mut session = Session::new().map_err(ssh_err)?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(ssh_err)?;
        session.userauth_password(username, password).map_err(ssh_err)?;
        debug!("authenticated to zeus board at {host}");

        let mut channel = session.channel_session().map_err(ssh_err)?;
        channel.request_pty("vt100", None, None).map_err(ssh_err)?;
        channel.shell().map_err(ssh_err)?;

        let mut link = StreamLink::new(channel, Duration::from_secs(6));

        // Root shell. The password is sent unconditionally; if sudo does not
        // prompt, the shell swallows the extra line.
        link.set_terminator(ROOT_PROMPT);
        link.sendcmd("sudo -i")?;
        link.sendcmd(password)?;
        link.read_until_terminator()?;
        link.query("source /usr/local/share/pynq-venv/bin/activate")?;

        // Python REPL and board library bring-up.
        link.set_terminator(PYTHON_PROMPT);
        link.sendcmd("python3")?;
        link.read_until_terminator()?;
        link.query("import time")?;
        link.query("from artemis2 import *")?;
        link.query("power.bypass_asic_check(True)")?;
        link.query("power.init(TargetRate.Gbps56_0)")?;
        debug!("zeus REPL ready");

        Ok(link)
    }
}
