//! Tests for the Arroyo 7144 laser diode driver.

use rstest::*;

use instrumentlink::{InstrumentError, ScriptedLink};

use arroyo_ldd7144::Ldd7144;

type LddLbk = Ldd7144<ScriptedLink>;

/// Create a driver over a scripted link from `(command, reply)` pairs.
fn crt_inst(script: Vec<(&str, Option<&str>)>) -> LddLbk {
    Ldd7144::new(ScriptedLink::new(script, "\n"))
}

#[fixture]
fn emp_inst() -> LddLbk {
    crt_inst(vec![])
}

/// Construction with an empty script must always pass.
#[rstest]
fn test_initialization(_emp_inst: LddLbk) {}

#[rstest]
#[case(1)]
#[case(4)]
fn test_set_channel(#[case] channel: usize) {
    let mut inst = crt_inst(vec![(format!("LAS:CHAN {channel}").as_str(), None)]);
    inst.set_channel(channel).unwrap();
}

#[rstest]
#[case(0)]
#[case(5)]
fn test_set_channel_out_of_range(#[case] channel: usize, mut emp_inst: LddLbk) {
    match emp_inst.set_channel(channel) {
        Err(InstrumentError::ChannelOutOfRange { idx, channels }) => {
            assert_eq!(idx, channel);
            assert_eq!(channels, 4);
        }
        other => panic!("expected ChannelOutOfRange, got {other:?}"),
    }
}

/// A set ramps until `*OPC?` reports 1; here the first poll says not done.
#[rstest]
fn test_set_current_polls_for_completion() {
    let mut inst = crt_inst(vec![
        ("LAS:LDI 120.0", None),
        ("*OPC?", Some("0")),
        ("*OPC?", Some("1")),
    ]);
    inst.set_current_ma(120.0).unwrap();
}

#[rstest]
fn test_negative_current_is_rejected(mut emp_inst: LddLbk) {
    assert!(matches!(
        emp_inst.set_current_ma(-1.0),
        Err(InstrumentError::ValueOutOfRange { .. })
    ));
}

#[rstest]
fn test_current_and_voltage_readback() {
    let mut inst = crt_inst(vec![
        ("LAS:LDI?", Some("119.9")),
        ("LAS:LDV?", Some("1.823")),
    ]);
    assert_eq!(inst.get_current_ma().unwrap(), 119.9);
    assert_eq!(inst.get_voltage_v().unwrap(), 1.823);
}

#[rstest]
#[case(true, "LAS:OUT 1")]
#[case(false, "LAS:OUT 0")]
fn test_set_output(#[case] enabled: bool, #[case] cmd: &str) {
    let mut inst = crt_inst(vec![(cmd, None)]);
    inst.set_output(enabled).unwrap();
}

#[rstest]
fn test_get_output() {
    let mut inst = crt_inst(vec![("LAS:OUT?", Some("1"))]);
    assert!(inst.get_output().unwrap());
}
