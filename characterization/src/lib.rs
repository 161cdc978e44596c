//! Bias-current and temperature characterization of multi-channel light
//! engines.
//!
//! A characterization run walks a grid of TEC temperatures and bias
//! currents. At each temperature the suite waits for the device to settle,
//! then steps the bias current; at each operating point it captures an
//! optical spectrum and derived metrics into a [`MeasurementRecord`], which
//! is streamed to the configured sinks (CSV file, PostgreSQL table) as soon
//! as it exists.
//!
//! The sweep logic only talks to instruments through the capability traits
//! in [`instruments`], so any bias source, temperature controller, or
//! spectrum analyzer with an adapter can be swapped in, and the whole
//! procedure runs against in-memory fakes in the test suite.
//!
//! [`MeasurementRecord`]: record::MeasurementRecord

#![warn(missing_docs)]

pub mod acquire;
pub mod axis;
pub mod config;
pub mod error;
pub mod instruments;
pub mod notify;
pub mod persist;
pub mod procedure;
pub mod record;

pub use acquire::{AcquisitionStep, SettlingConfig};
pub use axis::SweepAxis;
pub use error::RunError;
pub use procedure::{RunObserver, RunOutcome, SweepController, SweepPlan};
pub use record::MeasurementRecord;
