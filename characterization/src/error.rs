//! Error taxonomy for a characterization run.

use thiserror::Error;

use instrumentlink::InstrumentError;

/// Everything that can abort a characterization run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The requested sweep or suite configuration is not executable.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Talking to an instrument failed and local retries did not help.
    #[error("instrument communication failure: {0}")]
    Instrument(#[from] InstrumentError),

    /// The spectrum analyzer kept timing out and the re-trigger budget ran
    /// out.
    #[error("spectral sweep timed out {attempts} times, giving up")]
    SweepTimeout {
        /// Number of sweep attempts that timed out.
        attempts: usize,
    },

    /// The device never reached the target temperature.
    #[error("temperature did not settle at {target_c:.1} C within {attempts} polls")]
    SettlingFailed {
        /// Target temperature in Celsius.
        target_c: f64,
        /// Number of polls made before giving up.
        attempts: usize,
    },
}
