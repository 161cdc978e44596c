//! Sweep axis construction.

use crate::error::RunError;

/// An ordered list of set-points for one sweep dimension.
///
/// Axes are built once, up front, from the sweep configuration; the
/// controller then only iterates over the finished value list. All
/// constructors validate their inputs so an impossible sweep fails before
/// any instrument is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepAxis {
    values: Vec<f64>,
}

impl SweepAxis {
    /// Build a linear axis from `start` to `stop` with the given step.
    ///
    /// The axis always contains `start` and always reaches `stop`: the last
    /// element is the first grid point at or beyond `stop`. With
    /// `start = 0`, `stop = 5`, `step = 2` the axis is `[0, 2, 4, 6]`.
    pub fn linear(start: f64, stop: f64, step: f64) -> Result<Self, RunError> {
        if !(step > 0.0) {
            return Err(RunError::InvalidConfiguration(format!(
                "axis step must be positive, got {step}"
            )));
        }
        if stop < start {
            return Err(RunError::InvalidConfiguration(format!(
                "axis stop {stop} is below start {start}"
            )));
        }
        let mut values = Vec::new();
        for i in 0.. {
            let value = start + step * i as f64;
            values.push(value);
            if value >= stop {
                break;
            }
        }
        Ok(SweepAxis { values })
    }

    /// Build a two-resolution axis: a coarse segment from `start` up to (but
    /// excluding) `coarse_stop`, followed by a fine segment from
    /// `coarse_stop` through `stop`.
    ///
    /// The coarse segment covers the uninteresting low range quickly; the
    /// fine segment resolves the region of interest. The breakpoint itself
    /// belongs to the fine segment, so no set-point is visited twice.
    pub fn coarse_fine(
        start: f64,
        coarse_stop: f64,
        coarse_step: f64,
        stop: f64,
        fine_step: f64,
    ) -> Result<Self, RunError> {
        if !(coarse_step > 0.0) {
            return Err(RunError::InvalidConfiguration(format!(
                "coarse step must be positive, got {coarse_step}"
            )));
        }
        if coarse_stop < start || stop < coarse_stop {
            return Err(RunError::InvalidConfiguration(format!(
                "coarse/fine breakpoints must be ordered, got {start} / {coarse_stop} / {stop}"
            )));
        }
        let mut values = Vec::new();
        for i in 0.. {
            let value = start + coarse_step * i as f64;
            if value >= coarse_stop {
                break;
            }
            values.push(value);
        }
        let fine = SweepAxis::linear(coarse_stop, stop, fine_step)?;
        values.extend_from_slice(fine.values());
        Ok(SweepAxis { values })
    }

    /// An axis holding a single set-point.
    pub fn single(value: f64) -> Self {
        SweepAxis {
            values: vec![value],
        }
    }

    /// The set-points, in sweep order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of set-points on the axis.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the axis has no set-points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
