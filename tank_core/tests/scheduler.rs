use std::time::Duration;

use rstest::rstest;
use tank_core::config::{LoopCfg, RelayCfg, ThermalDevices};
use tank_core::error::BuildError;
use tank_core::{
    CalibrationModel, CalibrationPoint, ControlLoop, ControllerCfg, MenuId, PidController, PidGains, ReadError, TankController,
    ThermalPair, TickOutcome, WizardState,
};
use tank_hardware::{MemoryRemoteLogger, MemoryStore, ProbeFault, SimSettings, SimulatedTank};
use tank_traits::clock::test_clock::TestClock;
use tank_traits::{Channel, KeyEvent, ProbeKind, RecordStore};

struct Rig {
    clock: TestClock,
    tank: SimulatedTank,
    store: MemoryStore,
    logger: MemoryRemoteLogger,
    ctrl: TankController,
}

fn rig(settings: SimSettings, store: MemoryStore) -> Rig {
    let clock = TestClock::new();
    let tank = SimulatedTank::new(clock.clone(), settings);
    let logger = MemoryRemoteLogger::new();
    let ctrl = TankController::builder()
        .with_clock(Box::new(clock.clone()))
        .with_store(store.clone())
        .with_probes(tank.probes())
        .with_actuator(tank.relays())
        .with_logger(logger.clone())
        .try_build()
        .expect("build controller");
    Rig {
        clock,
        tank,
        store,
        logger,
        ctrl,
    }
}

fn press_str(ctrl: &mut TankController, s: &str) {
    for c in s.chars() {
        let k = match c {
            '.' => KeyEvent::DecimalPoint,
            d => KeyEvent::Digit(d.to_digit(10).unwrap() as u8),
        };
        ctrl.press(k);
    }
    ctrl.press(KeyEvent::Select);
}

#[rstest]
fn read_failure_forces_outputs_off() {
    let settings = SimSettings {
        temperature_c: 15.0,
        ..SimSettings::default()
    };
    let mut r = rig(settings, MemoryStore::new());
    let report = r.ctrl.tick();
    assert!(matches!(report.temperature, TickOutcome::Controlled { .. }));
    assert!(r.tank.is_on(Channel::Heater));

    r.tank
        .set_fault(ProbeKind::Temperature, Some(ProbeFault::Disconnected));
    r.clock.advance_ms(1_000);
    let report = r.ctrl.tick();
    assert!(matches!(
        report.temperature,
        TickOutcome::FailSafe(ReadError::Unavailable(_))
    ));
    assert!(!r.tank.is_on(Channel::Heater));
    assert_eq!(r.ctrl.context().value(ProbeKind::Temperature), None);
    assert!(r.ctrl.frame().starts_with("--C"));

    // recovery
    r.tank.set_fault(ProbeKind::Temperature, None);
    r.clock.advance_ms(1_000);
    let report = r.ctrl.tick();
    assert!(matches!(report.temperature, TickOutcome::Controlled { .. }));
}

#[rstest]
#[case(ProbeFault::Garbage, ReadError::NonFinite)]
#[case(ProbeFault::Timeout, ReadError::Timeout)]
fn ph_faults_map_to_read_errors(#[case] fault: ProbeFault, #[case] expected: ReadError) {
    let mut r = rig(SimSettings::default(), MemoryStore::new());
    r.tank.set_fault(ProbeKind::Ph, Some(fault));
    let report = r.ctrl.tick();
    assert_eq!(report.ph, TickOutcome::FailSafe(expected));
    assert!(!r.tank.is_on(Channel::Dose));
}

#[rstest]
fn stale_reading_forces_off_between_ticks() {
    let clock = TestClock::new();
    let tank = SimulatedTank::new(
        clock,
        SimSettings {
            temperature_c: 10.0,
            ..SimSettings::default()
        },
    );
    let relay = RelayCfg {
        threshold: 5.0,
        period_ms: 20_000,
        min_on_ms: 1_000,
        heater_min_off_ms: 1_000,
        chiller_min_off_ms: 1_000,
    };
    let cfg = LoopCfg {
        tick_ms: 10_000,
        stale_ms: 2_000,
        min: 0.0,
        max: 50.0,
        smoothing_window: 1,
    };
    let mut lp = ControlLoop::new(
        ProbeKind::Temperature,
        cfg,
        PidController::new(PidGains::new(10.0, 0.0, 0.0), -100.0, 100.0),
        ThermalPair::new(&relay, ThermalDevices::Both, -100.0, 100.0),
        25.0,
    );
    let mut probes = tank.probes();
    let mut relays = tank.relays();
    let t = Duration::from_millis(100);
    lp.tick(0, &mut probes, &mut relays, t, false);
    assert!(tank.is_on(Channel::Heater));
    assert_eq!(lp.tick(1_000, &mut probes, &mut relays, t, false), TickOutcome::NotDue);
    assert!(tank.is_on(Channel::Heater));
    assert_eq!(lp.tick(3_000, &mut probes, &mut relays, t, false), TickOutcome::NotDue);
    assert!(lp.is_stale(3_000));
    assert!(!tank.is_on(Channel::Heater));
}

#[rstest]
fn new_calibration_restarts_pid_history() {
    let clock = TestClock::new();
    let tank = SimulatedTank::new(clock, SimSettings::default());
    let relay = RelayCfg {
        threshold: 5.0,
        period_ms: 20_000,
        min_on_ms: 1_000,
        heater_min_off_ms: 1_000,
        chiller_min_off_ms: 1_000,
    };
    let cfg = LoopCfg {
        tick_ms: 1_000,
        stale_ms: 5_000,
        min: 0.0,
        max: 50.0,
        smoothing_window: 1,
    };
    let mut lp = ControlLoop::new(
        ProbeKind::Temperature,
        cfg,
        PidController::new(PidGains::new(10.0, 1.0, 5.0), -100.0, 100.0),
        ThermalPair::new(&relay, ThermalDevices::Both, -100.0, 100.0),
        25.0,
    );
    let mut probes = tank.probes();
    let mut relays = tank.relays();
    let t = Duration::from_millis(100);
    lp.tick(0, &mut probes, &mut relays, t, false);
    assert_eq!(lp.pid().previous_tick(), Some(0));
    assert!(lp.pid().integral() > 0.0);

    // raw 24 now reads as 20: the old error must not feed the derivative
    let model = CalibrationModel::from_points(
        &[CalibrationPoint::new(0.0, -4.0), CalibrationPoint::new(50.0, 46.0)],
        500,
    )
    .unwrap();
    lp.set_calibration(model);
    assert_eq!(lp.pid().previous_tick(), None);
    assert_eq!(lp.pid().integral(), 0.0);

    let outcome = lp.tick(1_000, &mut probes, &mut relays, t, false);
    let TickOutcome::Controlled { value, output } = outcome else {
        panic!("expected a controlled tick, got {outcome:?}");
    };
    assert!((value - 20.0).abs() < 1e-9);
    // kp * 5 + ki * 5 * 1ms, no derivative term
    assert!((output - 50.005).abs() < 1e-9);
    assert_eq!(lp.pid().previous_error(), 25.0 - value);
}

#[rstest]
fn remote_log_every_interval_with_on_times() {
    let mut r = rig(SimSettings::default(), MemoryStore::new());
    r.ctrl.context_mut().log_interval_min = 1;
    let ticks = r.ctrl.run(Duration::from_secs(1), Some(181), &|| false);
    assert_eq!(ticks, 181);

    let records = r.logger.records();
    let stamps: Vec<u64> = records.iter().map(|(_, _, t)| *t).collect();
    assert_eq!(stamps, vec![60_000, 120_000, 180_000]);
    assert!(records.iter().all(|(id, _, _)| *id == 1));
    let (_, first, _) = records[0];
    assert!(first.heater_on_ms > 0);
    assert_eq!(first.temperature_setpoint_c, 25.0);
    assert!(first.ph.is_some());

    assert!(!r.tank.thermal_overlap_seen());
    for ch in [Channel::Heater, Channel::Chiller, Channel::Dose] {
        assert!(!r.tank.is_on(ch), "{ch:?} left on after run");
    }
}

#[rstest]
fn temperature_feeds_ph_compensation() {
    let mut r = rig(SimSettings::default(), MemoryStore::new());
    r.ctrl.tick();
    assert_eq!(r.tank.compensation_c(), Some(24.0));
}

#[rstest]
fn ph_calibration_through_the_panel() {
    let mut r = rig(SimSettings::default(), MemoryStore::new());
    r.ctrl.press(KeyEvent::Down);
    r.ctrl.press(KeyEvent::Down);
    r.ctrl.press(KeyEvent::Select);
    assert_eq!(r.ctrl.menu().current(), MenuId::PhCalibrationLow);

    for (ph, typed, next) in [
        (4.0, "4", MenuId::PhCalibrationMid),
        (7.0, "7", MenuId::PhCalibrationHigh),
        (10.0, "10", MenuId::PhCalibrationSave),
    ] {
        r.clock.advance_ms(1_000);
        r.tank.set_ph(ph);
        let report = r.ctrl.tick();
        assert!(matches!(report.ph, TickOutcome::Suspended { .. }));
        assert!(!r.tank.is_on(Channel::Dose));
        press_str(&mut r.ctrl, typed);
        assert_eq!(r.ctrl.menu().current(), next);
    }
    assert_eq!(r.store.load("ph.calibration").unwrap(), None);

    r.ctrl.press(KeyEvent::Select);
    assert_eq!(r.ctrl.context().wizard.state(), WizardState::Committed);
    let model = *r.ctrl.context().calibration(ProbeKind::Ph);
    assert_eq!(model.apply(2000.0), 7.0);
    assert!(r.store.load("ph.calibration").unwrap().is_some());

    r.ctrl.press(KeyEvent::Select);
    assert_eq!(r.ctrl.menu().current(), MenuId::MainMenu);
    r.clock.advance_ms(1_000);
    let report = r.ctrl.tick();
    assert!(matches!(report.ph, TickOutcome::Controlled { value, .. } if (value - 10.0).abs() < 0.01));
}

#[rstest]
fn failed_calibration_save_is_reported_and_discarded() {
    let mut r = rig(SimSettings::default(), MemoryStore::new());
    r.ctrl.press(KeyEvent::Down);
    r.ctrl.press(KeyEvent::Down);
    r.ctrl.press(KeyEvent::Select);
    for (ph, typed) in [(4.0, "4"), (7.0, "7"), (10.0, "10")] {
        r.clock.advance_ms(1_000);
        r.tank.set_ph(ph);
        r.ctrl.tick();
        press_str(&mut r.ctrl, typed);
    }
    assert_eq!(r.ctrl.menu().current(), MenuId::PhCalibrationSave);

    r.store.fail_writes(true);
    r.ctrl.press(KeyEvent::Select);
    assert_eq!(r.ctrl.context().wizard.state(), WizardState::Aborted);
    assert!(r.ctrl.context().calibration(ProbeKind::Ph).is_identity());
    assert!(r.ctrl.frame().contains("cal failed"), "{}", r.ctrl.frame());

    r.ctrl.press(KeyEvent::Select);
    assert_eq!(r.ctrl.menu().current(), MenuId::MainMenu);
    r.store.fail_writes(false);
    assert_eq!(r.store.load("ph.calibration").unwrap(), None);
}

#[rstest]
fn aborted_calibration_keeps_old_model() {
    let mut r = rig(SimSettings::default(), MemoryStore::new());
    r.ctrl.press(KeyEvent::Down);
    r.ctrl.press(KeyEvent::Down);
    r.ctrl.press(KeyEvent::Down);
    r.ctrl.press(KeyEvent::Select);
    assert_eq!(r.ctrl.menu().current(), MenuId::TempCalibrationLow);
    r.clock.advance_ms(1_000);
    r.ctrl.tick();
    press_str(&mut r.ctrl, "24");
    r.ctrl.press(KeyEvent::Back);
    assert_eq!(r.ctrl.menu().current(), MenuId::MainMenu);
    assert!(!r.ctrl.context().wizard.is_active());
    assert!(r.ctrl.context().calibration(ProbeKind::Temperature).is_identity());
    assert!(r.store.is_empty());
}

#[rstest]
fn persisted_settings_are_restored_when_valid() {
    let mut store = MemoryStore::new();
    store.save("ph.setpoint", "7.5").unwrap();
    store.save("temp.setpoint", "99.0").unwrap();
    store.save("device.tank_id", "12").unwrap();
    store.save("ph.dose_mode", "\"continuous\"").unwrap();
    let r = rig(SimSettings::default(), store);
    let ctx = r.ctrl.context();
    assert_eq!(ctx.setpoint(ProbeKind::Ph), 7.5);
    assert_eq!(ctx.setpoint(ProbeKind::Temperature), 25.0);
    assert_eq!(ctx.tank_id, 12);
    assert_eq!(ctx.dose_mode(), tank_core::DoseMode::Continuous);
}

#[rstest]
fn builder_requires_probes() {
    let err = TankController::builder()
        .with_config(ControllerCfg::default())
        .with_store(MemoryStore::new())
        .try_build()
        .expect_err("probes missing");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Missing("probes")) => {}
        other => panic!("expected Missing(probes), got {other:?}"),
    }
}
