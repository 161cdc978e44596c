//! A scripted link for testing instrument drivers without hardware.

use std::collections::VecDeque;

use crate::{InstrumentError, InstrumentLink};

/// One expected command and the reply the fake instrument gives for it.
///
/// A reply of `None` models a write-only command that the instrument does not
/// answer.
#[derive(Debug, Clone)]
struct Exchange {
    cmd: String,
    reply: Option<String>,
}

/// A test double that replays a fixed script of command/response exchanges.
///
/// The script is an ordered list of [`Exchange`]s. Every command the driver
/// sends is checked against the next scripted command; a mismatch panics with
/// both strings, and dropping the link with unconsumed script entries panics
/// as well. This keeps driver tests honest about the exact wire traffic they
/// produce.
///
/// # Example
///
/// ```
/// use instrumentlink::{InstrumentLink, ScriptedLink};
///
/// let mut link = ScriptedLink::new(
///     vec![("*IDN?", Some("ACME,WIDGET,1234"))],
///     "\n",
/// );
/// assert_eq!(link.query("*IDN?").unwrap(), "ACME,WIDGET,1234");
/// ```
pub struct ScriptedLink {
    script: VecDeque<Exchange>,
    /// The command framing the driver under test is expected to produce.
    expected_command_terminator: String,
    terminator: String,
    command_terminator: String,
    pending_read: VecDeque<u8>,
}

impl ScriptedLink {
    /// Create a scripted link from `(command, reply)` pairs.
    ///
    /// Replies are framed with whatever response terminator the driver
    /// configures on the link, so prompt-style protocols script naturally.
    ///
    /// # Arguments
    /// * `script` - Expected commands, in order, with the canned reply for
    ///   each (or `None` for commands the instrument does not answer).
    /// * `expected_command_terminator` - The framing the driver must append
    ///   to commands; anything else panics.
    pub fn new(script: Vec<(&str, Option<&str>)>, expected_command_terminator: &str) -> Self {
        let script = script
            .into_iter()
            .map(|(cmd, reply)| Exchange {
                cmd: cmd.to_string(),
                reply: reply.map(str::to_string),
            })
            .collect();
        ScriptedLink {
            script,
            expected_command_terminator: expected_command_terminator.to_string(),
            terminator: "\n".to_string(),
            command_terminator: "\n".to_string(),
            pending_read: VecDeque::new(),
        }
    }

    /// Panic if any scripted exchanges were never consumed.
    ///
    /// Called automatically on drop; available for explicit use when a test
    /// wants the failure at a particular point.
    pub fn finish(&mut self) {
        if let Some(leftover) = self.script.front() {
            panic!(
                "scripted link dropped with unconsumed exchanges, next was {:?}",
                leftover.cmd
            );
        }
    }
}

impl Drop for ScriptedLink {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finish();
        }
    }
}

impl InstrumentLink for ScriptedLink {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let written = str::from_utf8(data).expect("driver wrote non-UTF-8 command");
        let Some(cmd) = written.strip_suffix(&self.expected_command_terminator) else {
            panic!(
                "command {written:?} not framed with expected terminator {:?}",
                self.expected_command_terminator
            );
        };
        let next = self
            .script
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command {cmd:?}, script is exhausted"));
        assert_eq!(cmd, next.cmd, "driver sent {cmd:?}, script expected {:?}", next.cmd);
        if let Some(reply) = next.reply {
            let reply_terminator = self.terminator.clone();
            self.pending_read
                .extend(reply.bytes().chain(reply_terminator.bytes()));
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self
                .pending_read
                .pop_front()
                .expect("driver read past the scripted reply");
        }
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
}
