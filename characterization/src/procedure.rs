//! The sweep controller: walks the temperature and bias grids.

use log::{error, info};
use measurements::Temperature;

use crate::{
    acquire::{AcquireOutcome, AcquisitionStep, SettleOutcome},
    axis::SweepAxis,
    error::RunError,
    record::{MeasurementRecord, SweepProgress},
};

/// How a characterization run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every grid coordinate was measured.
    Completed,
    /// A cancellation request stopped the run between coordinates.
    Cancelled,
    /// An error aborted the run.
    Failed(RunError),
}

/// Receives records and progress as the sweep produces them.
///
/// `result` is called exactly once per measured coordinate, in sweep order,
/// as soon as the coordinate's record exists; `progress` follows each
/// `result` call.
pub trait RunObserver {
    /// A coordinate was measured.
    fn result(&mut self, record: &MeasurementRecord);
    /// The sweep advanced.
    fn progress(&mut self, progress: SweepProgress);
}

/// The grid one run walks: every bias set-point at every temperature.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    /// TEC temperatures, outer loop, in Celsius.
    pub temperature_axis: SweepAxis,
    /// Bias currents, inner loop, in milliamps.
    pub bias_axis: SweepAxis,
}

impl SweepPlan {
    /// Total number of grid coordinates.
    pub fn total_points(&self) -> usize {
        self.temperature_axis.len() * self.bias_axis.len()
    }
}

/// Runs a characterization sweep to completion.
///
/// The controller holds no instrument knowledge of its own; every
/// measurement and every shutdown action goes through the
/// [`AcquisitionStep`]. Cancellation is cooperative: `should_cancel` is
/// polled between coordinates, during settling, and between sweep
/// re-triggers; a measurement in flight otherwise finishes before the run
/// stops.
pub struct SweepController<'a> {
    step: AcquisitionStep<'a>,
    plan: SweepPlan,
    safe_temperature: Temperature,
}

impl<'a> SweepController<'a> {
    /// Create a controller for the given plan.
    ///
    /// The shutdown set-point defaults to 25 C.
    pub fn new(step: AcquisitionStep<'a>, plan: SweepPlan) -> Self {
        SweepController {
            step,
            plan,
            safe_temperature: Temperature::from_celsius(25.0),
        }
    }

    /// Replace the temperature the TEC is returned to at shutdown.
    pub fn with_safe_temperature(mut self, safe_temperature: Temperature) -> Self {
        self.safe_temperature = safe_temperature;
        self
    }

    /// Run the full sweep, then put the instruments into a safe state.
    ///
    /// Shutdown happens whatever the outcome, including after errors and
    /// cancellations.
    pub fn execute(
        &mut self,
        observer: &mut dyn RunObserver,
        should_cancel: &mut dyn FnMut() -> bool,
    ) -> RunOutcome {
        let outcome = self.run(observer, should_cancel);
        match &outcome {
            RunOutcome::Completed => info!("sweep completed"),
            RunOutcome::Cancelled => info!("sweep cancelled"),
            RunOutcome::Failed(err) => error!("sweep failed: {err}"),
        }
        self.step.shutdown(self.safe_temperature);
        outcome
    }

    /// Walk the grid: settle each temperature, then step the bias axis,
    /// measuring one record per coordinate.
    fn run(
        &mut self,
        observer: &mut dyn RunObserver,
        should_cancel: &mut dyn FnMut() -> bool,
    ) -> RunOutcome {
        let total = self.plan.total_points();
        let temperatures = self.plan.temperature_axis.values().to_vec();
        let biases = self.plan.bias_axis.values().to_vec();
        info!(
            "starting sweep: {} temperatures x {} bias points",
            temperatures.len(),
            biases.len()
        );

        let mut completed = 0;
        for &temp_c in &temperatures {
            if should_cancel() {
                return RunOutcome::Cancelled;
            }
            let target = Temperature::from_celsius(temp_c);
            match self.step.settle_temperature(target, should_cancel) {
                Ok(SettleOutcome::Settled) => {}
                Ok(SettleOutcome::Cancelled) => return RunOutcome::Cancelled,
                Err(err) => return RunOutcome::Failed(err),
            }
            for &bias_ma in &biases {
                if should_cancel() {
                    return RunOutcome::Cancelled;
                }
                match self.step.acquire(bias_ma, should_cancel) {
                    Ok(AcquireOutcome::Measured(record)) => {
                        observer.result(&record);
                        completed += 1;
                        observer.progress(SweepProgress { completed, total });
                    }
                    Ok(AcquireOutcome::Cancelled) => return RunOutcome::Cancelled,
                    Err(err) => return RunOutcome::Failed(err),
                }
            }
        }
        RunOutcome::Completed
    }
}
