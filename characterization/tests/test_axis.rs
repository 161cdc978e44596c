//! Tests for sweep axis construction.

use rstest::*;

use light_engine_characterization::{RunError, SweepAxis};

#[rstest]
fn test_linear_includes_both_endpoints() {
    let axis = SweepAxis::linear(0.0, 5.0, 1.0).unwrap();
    assert_eq!(axis.values(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(axis.len(), 6);
}

/// When the stop value is off-grid, the axis still reaches it: the last
/// element is the first grid point at or beyond the stop.
#[rstest]
fn test_linear_off_grid_stop_overshoots() {
    let axis = SweepAxis::linear(0.0, 5.0, 2.0).unwrap();
    assert_eq!(axis.values(), &[0.0, 2.0, 4.0, 6.0]);
}

#[rstest]
fn test_linear_degenerate_range_is_one_point() {
    let axis = SweepAxis::linear(3.0, 3.0, 1.0).unwrap();
    assert_eq!(axis.values(), &[3.0]);
}

#[rstest]
#[case(0.0, 5.0, 0.0)]
#[case(0.0, 5.0, -1.0)]
#[case(5.0, 0.0, 1.0)]
fn test_linear_invalid_inputs(#[case] start: f64, #[case] stop: f64, #[case] step: f64) {
    assert!(matches!(
        SweepAxis::linear(start, stop, step),
        Err(RunError::InvalidConfiguration(_))
    ));
}

#[rstest]
fn test_coarse_fine_segments() {
    let axis = SweepAxis::coarse_fine(0.0, 200.0, 20.0, 500.0, 1.0).unwrap();
    let values = axis.values();

    // Coarse segment runs up to, but not including, the breakpoint.
    assert_eq!(
        &values[..10],
        &[0.0, 20.0, 40.0, 60.0, 80.0, 100.0, 120.0, 140.0, 160.0, 180.0]
    );
    // The breakpoint opens the fine segment; nothing is visited twice.
    assert_eq!(values[10], 200.0);
    assert_eq!(values[11], 201.0);
    assert_eq!(*values.last().unwrap(), 500.0);
    assert_eq!(axis.len(), 10 + 301);
}

#[rstest]
fn test_coarse_fine_disordered_breakpoints_are_rejected() {
    assert!(matches!(
        SweepAxis::coarse_fine(0.0, 500.0, 20.0, 200.0, 1.0),
        Err(RunError::InvalidConfiguration(_))
    ));
}

#[rstest]
fn test_single_point_axis() {
    let axis = SweepAxis::single(35.0);
    assert_eq!(axis.values(), &[35.0]);
    assert!(!axis.is_empty());
}
