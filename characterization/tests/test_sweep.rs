//! End-to-end sweep tests against in-memory instrument fakes.

use std::{cell::Cell, collections::VecDeque, rc::Rc, time::Duration};

use measurements::Temperature;
use rstest::*;

use instrumentlink::InstrumentError;
use light_engine_characterization::{
    acquire::{AcquireOutcome, AcquisitionStep, SettleOutcome, SettlingConfig},
    axis::SweepAxis,
    error::RunError,
    instruments::{
        AuxMonitor, BiasSource, Instruments, SpectrumAnalyzer, SweepStatus, TemperatureController,
    },
    procedure::{RunObserver, RunOutcome, SweepController, SweepPlan},
    record::{MeasurementRecord, SweepProgress},
};

#[derive(Default)]
struct FakeBias {
    current_ma: f64,
    history: Vec<f64>,
    output_enabled: bool,
    /// Completed set-point count, shared with cancellation closures.
    sets: Rc<Cell<usize>>,
}

impl BiasSource for FakeBias {
    fn set_bias_ma(&mut self, current_ma: f64) -> Result<(), InstrumentError> {
        self.current_ma = current_ma;
        self.history.push(current_ma);
        self.sets.set(self.sets.get() + 1);
        Ok(())
    }

    fn get_bias_ma(&mut self) -> Result<f64, InstrumentError> {
        Ok(self.current_ma)
    }

    fn get_voltage_v(&mut self) -> Result<f64, InstrumentError> {
        Ok(1.8)
    }

    fn set_output(&mut self, enabled: bool) -> Result<(), InstrumentError> {
        self.output_enabled = enabled;
        Ok(())
    }
}

#[derive(Default)]
struct FakeTec {
    setpoint_c: f64,
    setpoints: Vec<f64>,
    output_enabled: bool,
    /// Offset added to every reading; nonzero keeps the fake out of band.
    offset_c: f64,
    /// Readings served before falling back to the set-point.
    scripted_readings: VecDeque<f64>,
    polls: usize,
}

impl TemperatureController for FakeTec {
    fn set_temperature(&mut self, setpoint: Temperature) -> Result<(), InstrumentError> {
        self.setpoint_c = setpoint.as_celsius();
        self.setpoints.push(self.setpoint_c);
        Ok(())
    }

    fn get_temperature(&mut self) -> Result<Temperature, InstrumentError> {
        self.polls += 1;
        let celsius = self
            .scripted_readings
            .pop_front()
            .unwrap_or(self.setpoint_c + self.offset_c);
        Ok(Temperature::from_celsius(celsius))
    }

    fn set_output(&mut self, enabled: bool) -> Result<(), InstrumentError> {
        self.output_enabled = enabled;
        Ok(())
    }
}

struct FakeOsa {
    peak_dbm: f64,
    /// Sweeps that time out before one finally completes.
    timeouts_remaining: usize,
    /// Trigger count, shared with cancellation closures.
    sweeps_triggered: Rc<Cell<usize>>,
    extended_queries: usize,
}

impl Default for FakeOsa {
    fn default() -> Self {
        FakeOsa {
            peak_dbm: -5.0,
            timeouts_remaining: 0,
            sweeps_triggered: Rc::default(),
            extended_queries: 0,
        }
    }
}

impl SpectrumAnalyzer for FakeOsa {
    fn single_sweep(&mut self) -> Result<SweepStatus, InstrumentError> {
        self.sweeps_triggered.set(self.sweeps_triggered.get() + 1);
        if self.timeouts_remaining > 0 {
            self.timeouts_remaining -= 1;
            return Ok(SweepStatus::TimedOut);
        }
        Ok(SweepStatus::Complete)
    }

    fn read_trace(&mut self) -> Result<(Vec<f64>, Vec<f64>), InstrumentError> {
        Ok((
            vec![1565.0, 1575.0, 1585.0],
            vec![-60.0, self.peak_dbm, -60.0],
        ))
    }

    fn measure_peak(&mut self) -> Result<(f64, f64), InstrumentError> {
        Ok((1575.0, self.peak_dbm))
    }

    fn measure_smsr(&mut self) -> Result<(f64, f64), InstrumentError> {
        self.extended_queries += 1;
        Ok((0.8, 42.0))
    }

    fn measure_linewidth(&mut self, delta_db: f64) -> Result<f64, InstrumentError> {
        self.extended_queries += 1;
        Ok(delta_db * 0.01)
    }
}

#[derive(Default)]
struct FakeAux {
    zeroed: bool,
}

impl AuxMonitor for FakeAux {
    fn get_temperatures(&mut self) -> Result<(f64, f64), InstrumentError> {
        Ok((30.0, 50.0))
    }

    fn get_mpd_ma(&mut self, _channel: usize) -> Result<f64, InstrumentError> {
        Ok(1.2)
    }

    fn zero_all_channels(&mut self) -> Result<(), InstrumentError> {
        self.zeroed = true;
        Ok(())
    }
}

#[derive(Default)]
struct Fakes {
    bias: FakeBias,
    tec: FakeTec,
    osa: FakeOsa,
    aux: FakeAux,
}

#[derive(Default)]
struct Recorder {
    records: Vec<MeasurementRecord>,
    progress: Vec<SweepProgress>,
}

impl RunObserver for Recorder {
    fn result(&mut self, record: &MeasurementRecord) {
        self.records.push(record.clone());
    }

    fn progress(&mut self, progress: SweepProgress) {
        self.progress.push(progress);
    }
}

/// Settling tuned so tests run instantly.
fn fast_settling() -> SettlingConfig {
    SettlingConfig {
        tolerance_c: 0.1,
        poll_interval: Duration::ZERO,
        n_consecutive: 2,
        max_attempts: 5,
        settling_time: Duration::ZERO,
    }
}

fn step_over(fakes: &mut Fakes) -> AcquisitionStep<'_> {
    AcquisitionStep::new(
        Instruments {
            bias: &mut fakes.bias,
            tec: &mut fakes.tec,
            osa: &mut fakes.osa,
            aux: Some(&mut fakes.aux),
        },
        "LE-01",
        2,
    )
    .with_settling(fast_settling())
}

/// Measure one point with cancellation off, unwrapping the record.
fn measure(step: &mut AcquisitionStep<'_>, bias_ma: f64) -> MeasurementRecord {
    match step.acquire(bias_ma, &mut || false).unwrap() {
        AcquireOutcome::Measured(record) => record,
        AcquireOutcome::Cancelled => panic!("acquisition was cancelled"),
    }
}

fn small_plan() -> SweepPlan {
    SweepPlan {
        temperature_axis: SweepAxis::single(25.0),
        bias_axis: SweepAxis::linear(0.0, 5.0, 1.0).unwrap(),
    }
}

#[rstest]
fn test_full_grid_measured_in_order() {
    let mut fakes = Fakes::default();
    let mut controller = SweepController::new(step_over(&mut fakes), small_plan());
    let mut observer = Recorder::default();

    let outcome = controller.execute(&mut observer, &mut || false);

    assert!(matches!(outcome, RunOutcome::Completed));
    let biases: Vec<f64> = observer
        .records
        .iter()
        .map(|record| record.bias_current_ma)
        .collect();
    assert_eq!(biases, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(
        observer.progress.last(),
        Some(&SweepProgress {
            completed: 6,
            total: 6
        })
    );
    assert!((observer.progress.last().unwrap().percent() - 100.0).abs() < 1e-12);
}

#[rstest]
fn test_record_carries_all_telemetry() {
    let mut fakes = Fakes::default();
    let mut controller = SweepController::new(
        step_over(&mut fakes),
        SweepPlan {
            temperature_axis: SweepAxis::single(25.0),
            bias_axis: SweepAxis::single(150.0),
        },
    );
    let mut observer = Recorder::default();
    controller.execute(&mut observer, &mut || false);

    let record = &observer.records[0];
    assert_eq!(record.light_engine_id, "LE-01");
    assert_eq!(record.channel, 2);
    assert_eq!(record.bias_current_ma, 150.0);
    assert_eq!(record.voltage_v, 1.8);
    assert_eq!(record.tec_temp_c, 25.0);
    assert_eq!(record.ambient_temp_c, 30.0);
    assert_eq!(record.light_engine_temp_c, 50.0);
    assert_eq!(record.mpd_ma, 1.2);
    assert_eq!(record.peak_wavelength_nm, 1575.0);
    // Power conversion: -60 dBm is a nanowatt.
    assert!((record.power_uw[0] - 1e-3).abs() < 1e-9);
}

#[rstest]
fn test_extended_metrics_above_gate() {
    let mut fakes = Fakes::default();
    fakes.osa.peak_dbm = -25.0;
    let mut controller = SweepController::new(
        step_over(&mut fakes),
        SweepPlan {
            temperature_axis: SweepAxis::single(25.0),
            bias_axis: SweepAxis::single(100.0),
        },
    );
    let mut observer = Recorder::default();
    controller.execute(&mut observer, &mut || false);

    let record = &observer.records[0];
    assert_eq!(record.smsr_db, Some(42.0));
    assert_eq!(record.smsr_offset_nm, Some(0.8));
    assert_eq!(record.linewidth_3db_nm, Some(0.03));
    assert_eq!(record.linewidth_20db_nm, Some(0.2));
}

/// Below the peak-power gate the spectrum is spontaneous emission; the
/// analyses are never even queried.
#[rstest]
fn test_extended_metrics_gated_when_dark() {
    let mut fakes = Fakes::default();
    fakes.osa.peak_dbm = -40.0;
    let mut controller = SweepController::new(
        step_over(&mut fakes),
        SweepPlan {
            temperature_axis: SweepAxis::single(25.0),
            bias_axis: SweepAxis::single(1.0),
        },
    );
    let mut observer = Recorder::default();
    let outcome = controller.execute(&mut observer, &mut || false);

    assert!(matches!(outcome, RunOutcome::Completed));
    let record = &observer.records[0];
    assert_eq!(record.smsr_db, None);
    assert_eq!(record.smsr_offset_nm, None);
    assert_eq!(record.linewidth_3db_nm, None);
    assert_eq!(record.linewidth_20db_nm, None);
    assert_eq!(fakes.osa.extended_queries, 0);
}

#[rstest]
fn test_sweep_timeouts_are_retriggered() {
    let mut fakes = Fakes::default();
    fakes.osa.timeouts_remaining = 2;
    let mut controller = SweepController::new(step_over(&mut fakes), small_plan());
    let mut observer = Recorder::default();

    let outcome = controller.execute(&mut observer, &mut || false);

    assert!(matches!(outcome, RunOutcome::Completed));
    assert_eq!(observer.records.len(), 6);
    // Six points plus the two timed-out triggers.
    assert_eq!(fakes.osa.sweeps_triggered.get(), 8);
}

/// An analyzer that never completes a sweep must not make the run immune to
/// cancellation: the flag is honored between re-triggers.
#[rstest]
fn test_cancellation_ends_endless_sweep_timeouts() {
    let mut fakes = Fakes::default();
    fakes.osa.timeouts_remaining = usize::MAX;
    let triggers = Rc::clone(&fakes.osa.sweeps_triggered);
    let mut controller = SweepController::new(step_over(&mut fakes), small_plan());
    let mut observer = Recorder::default();

    let outcome = controller.execute(&mut observer, &mut || triggers.get() >= 1);

    assert!(matches!(outcome, RunOutcome::Cancelled));
    assert!(observer.records.is_empty());
    // Cancellation lands right after the first timed-out trigger.
    assert_eq!(fakes.osa.sweeps_triggered.get(), 1);
    // The run still ends in a safe state.
    assert_eq!(fakes.bias.history.last(), Some(&0.0));
    assert!(!fakes.bias.output_enabled);
    assert!(!fakes.tec.output_enabled);
}

#[rstest]
fn test_sweep_retry_budget_exhaustion_fails_the_run() {
    let mut fakes = Fakes::default();
    fakes.osa.timeouts_remaining = 10;
    let step = step_over(&mut fakes).with_sweep_retry_limit(Some(1));
    let mut controller = SweepController::new(step, small_plan());
    let mut observer = Recorder::default();

    let outcome = controller.execute(&mut observer, &mut || false);

    match outcome {
        RunOutcome::Failed(RunError::SweepTimeout { attempts }) => assert_eq!(attempts, 2),
        other => panic!("expected SweepTimeout, got {other:?}"),
    }
    assert!(observer.records.is_empty());
    // The run still ends in a safe state.
    assert_eq!(fakes.bias.history.last(), Some(&0.0));
    assert!(!fakes.bias.output_enabled);
}

#[rstest]
fn test_cancellation_keeps_finished_points() {
    let mut fakes = Fakes::default();
    let completed_sets = Rc::clone(&fakes.bias.sets);
    let mut controller = SweepController::new(step_over(&mut fakes), small_plan());
    let mut observer = Recorder::default();

    // Request cancellation once three points have been measured; the
    // in-flight point always finishes.
    let outcome = controller.execute(&mut observer, &mut || completed_sets.get() >= 3);

    assert!(matches!(outcome, RunOutcome::Cancelled));
    assert_eq!(observer.records.len(), 3);
    assert_eq!(fakes.bias.history.last(), Some(&0.0));
    assert!(!fakes.bias.output_enabled);
    assert!(!fakes.tec.output_enabled);
}

/// A device that never reaches the set-point fails the run, and the failure
/// still leaves every instrument disabled.
#[rstest]
fn test_settling_failure_shuts_everything_down() {
    let mut fakes = Fakes::default();
    fakes.tec.offset_c = 5.0;
    let mut controller = SweepController::new(
        step_over(&mut fakes),
        SweepPlan {
            temperature_axis: SweepAxis::single(45.0),
            bias_axis: SweepAxis::linear(0.0, 5.0, 1.0).unwrap(),
        },
    );
    let mut observer = Recorder::default();

    let outcome = controller.execute(&mut observer, &mut || false);

    match outcome {
        RunOutcome::Failed(RunError::SettlingFailed { target_c, attempts }) => {
            assert_eq!(target_c, 45.0);
            assert_eq!(attempts, 5);
        }
        other => panic!("expected SettlingFailed, got {other:?}"),
    }
    assert!(observer.records.is_empty());
    assert_eq!(fakes.bias.history.last(), Some(&0.0));
    assert!(!fakes.bias.output_enabled);
    assert!(!fakes.tec.output_enabled);
    // TEC returned to the safe set-point before being switched off.
    assert_eq!(fakes.tec.setpoints.last(), Some(&25.0));
    assert!(fakes.aux.zeroed);
}

/// One out-of-band reading resets the consecutive-poll count.
#[rstest]
fn test_settling_requires_consecutive_in_band_polls() {
    let mut fakes = Fakes::default();
    fakes.tec.scripted_readings = VecDeque::from([25.0, 30.0, 25.0, 25.0]);
    let mut step = step_over(&mut fakes);

    let outcome = step
        .settle_temperature(Temperature::from_celsius(25.0), &mut || false)
        .unwrap();

    assert_eq!(outcome, SettleOutcome::Settled);
    drop(step);
    assert_eq!(fakes.tec.polls, 4);
}

/// With identical instrument responses, repeating a point reproduces the
/// record exactly; only the timestamps move.
#[rstest]
fn test_acquire_is_repeatable_modulo_timestamps() {
    let mut fakes = Fakes::default();
    let mut step = step_over(&mut fakes);

    let first = measure(&mut step, 100.0);
    let second = measure(&mut step, 100.0);

    let mut normalized = second;
    normalized.date = first.date;
    normalized.time = first.time;
    assert_eq!(first, normalized);
}

/// Without a board monitor the board telemetry fields stay unfilled.
#[rstest]
fn test_missing_board_monitor_yields_nan_telemetry() {
    let mut fakes = Fakes::default();
    let step = AcquisitionStep::new(
        Instruments {
            bias: &mut fakes.bias,
            tec: &mut fakes.tec,
            osa: &mut fakes.osa,
            aux: None,
        },
        "LE-01",
        0,
    )
    .with_settling(fast_settling());
    let mut controller = SweepController::new(
        step,
        SweepPlan {
            temperature_axis: SweepAxis::single(25.0),
            bias_axis: SweepAxis::single(10.0),
        },
    );
    let mut observer = Recorder::default();
    controller.execute(&mut observer, &mut || false);

    let record = &observer.records[0];
    assert!(record.ambient_temp_c.is_nan());
    assert!(record.light_engine_temp_c.is_nan());
    assert!(record.mpd_ma.is_nan());
}
