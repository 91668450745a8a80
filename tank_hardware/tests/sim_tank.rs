use std::time::Duration;

use rstest::rstest;
use tank_hardware::{ProbeFault, SimSettings, SimulatedTank};
use tank_traits::clock::test_clock::TestClock;
use tank_traits::{Actuator, Channel, ProbeKind, ProbeReader};

fn tank() -> (TestClock, SimulatedTank) {
    let clock = TestClock::new();
    let tank = SimulatedTank::new(clock.clone(), SimSettings::default());
    (clock, tank)
}

#[rstest]
#[case(ProbeFault::Disconnected, "disconnected")]
#[case(ProbeFault::Timeout, "timeout")]
fn faults_report_errors(#[case] fault: ProbeFault, #[case] needle: &str) {
    let (_, tank) = tank();
    tank.set_fault(ProbeKind::Temperature, Some(fault));
    let err = tank
        .probes()
        .read(ProbeKind::Temperature, Duration::from_millis(50))
        .unwrap_err();
    assert!(err.to_string().contains(needle), "{err}");
    // the other probe is unaffected
    assert!(tank.probes().read(ProbeKind::Ph, Duration::from_millis(50)).is_ok());
}

#[test]
fn garbage_fault_reads_non_finite() {
    let (_, tank) = tank();
    tank.set_fault(ProbeKind::Ph, Some(ProbeFault::Garbage));
    let v = tank.probes().read(ProbeKind::Ph, Duration::from_millis(50)).unwrap();
    assert!(!v.is_finite());
    tank.set_fault(ProbeKind::Ph, None);
    let v = tank.probes().read(ProbeKind::Ph, Duration::from_millis(50)).unwrap();
    assert!(v.is_finite());
}

#[test]
fn dosing_lowers_ph() {
    let (clock, tank) = tank();
    let before = tank.ph();
    tank.relays().set_drive(Channel::Dose, true).unwrap();
    clock.advance(Duration::from_secs(120));
    assert!(tank.ph() < before - 0.4);
}

#[test]
fn overlap_is_recorded() {
    let (_, tank) = tank();
    let mut relays = tank.relays();
    relays.set_drive(Channel::Heater, true).unwrap();
    assert!(!tank.thermal_overlap_seen());
    relays.set_drive(Channel::Chiller, true).unwrap();
    assert!(tank.thermal_overlap_seen());
    assert_eq!(tank.drive_log().len(), 2);
}

#[test]
fn compensation_is_forwarded() {
    let (_, tank) = tank();
    tank.probes().set_temperature_compensation(25.5);
    assert_eq!(tank.compensation_c(), Some(25.5));
}
