//! Tests for the Arroyo 5240 TEC source driver.

use measurements::Temperature;
use rstest::*;

use instrumentlink::ScriptedLink;

use arroyo_tec5240::Tec5240;

type TecLbk = Tec5240<ScriptedLink>;

/// Create a driver over a scripted link from `(command, reply)` pairs.
fn crt_inst(script: Vec<(&str, Option<&str>)>) -> TecLbk {
    Tec5240::new(ScriptedLink::new(script, "\n"))
}

#[fixture]
fn emp_inst() -> TecLbk {
    crt_inst(vec![])
}

/// Construction with an empty script must always pass.
#[rstest]
fn test_initialization(_emp_inst: TecLbk) {}

#[rstest]
fn test_get_name() {
    let mut inst = crt_inst(vec![("*IDN?", Some("Arroyo Instruments,5240,12345,1.0"))]);
    assert_eq!(inst.get_name().unwrap(), "Arroyo Instruments,5240,12345,1.0");
}

#[rstest]
fn test_set_get_temperature() {
    let mut inst = crt_inst(vec![
        ("TEC:T 25.000", None),
        ("TEC:T?", Some("24.987")),
    ]);
    inst.set_temperature(Temperature::from_celsius(25.0)).unwrap();
    let temp = inst.get_temperature().unwrap();
    assert!((temp.as_celsius() - 24.987).abs() < 1e-9);
}

#[rstest]
fn test_garbage_temperature_is_parse_error() {
    let mut inst = crt_inst(vec![("TEC:T?", Some("banana"))]);
    assert!(inst.get_temperature().is_err());
}

#[rstest]
#[case(true, "TEC:OUT 1")]
#[case(false, "TEC:OUT 0")]
fn test_set_output(#[case] enabled: bool, #[case] cmd: &str) {
    let mut inst = crt_inst(vec![(cmd, None)]);
    inst.set_output(enabled).unwrap();
}

#[rstest]
fn test_get_output() {
    let mut inst = crt_inst(vec![("TEC:OUT?", Some("1")), ("TEC:OUT?", Some("0"))]);
    assert!(inst.get_output().unwrap());
    assert!(!inst.get_output().unwrap());
}

#[rstest]
fn test_get_pid() {
    let mut inst = crt_inst(vec![("TEC:PID?", Some("4.0,0.7,0.1"))]);
    assert_eq!(inst.get_pid().unwrap(), (4.0, 0.7, 0.1));
}

#[rstest]
fn test_get_pid_wrong_arity_is_parse_error() {
    let mut inst = crt_inst(vec![("TEC:PID?", Some("4.0,0.7"))]);
    assert!(inst.get_pid().is_err());
}
