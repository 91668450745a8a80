use proptest::prelude::*;
use rstest::rstest;
use tank_core::config::{DoseCfg, DoseDirection, DoseMode, RelayCfg, ThermalDevices};
use tank_core::{ActuatorPolicy, ControlSignal, DoseController, PolicyPhase, ThermalPair};
use tank_traits::Channel;

fn relay() -> RelayCfg {
    RelayCfg {
        threshold: 5.0,
        period_ms: 10_000,
        min_on_ms: 1_000,
        heater_min_off_ms: 1_000,
        chiller_min_off_ms: 30_000,
    }
}

fn dose_cfg(mode: DoseMode) -> DoseCfg {
    DoseCfg {
        period_ms: 10_000,
        max_dose_ms: 3_000,
        min_off_ms: 1_000,
        threshold: 1.0,
        direction: DoseDirection::Lower,
        mode,
    }
}

fn signal(error: f64, output: f64) -> Option<ControlSignal> {
    Some(ControlSignal { error, output })
}

proptest! {
    #[test]
    fn heater_and_chiller_never_drive_together(
        steps in proptest::collection::vec((0u64..15_000, -100.0f64..100.0, any::<bool>()), 1..200),
    ) {
        let mut pair = ThermalPair::new(&relay(), ThermalDevices::Both, -100.0, 100.0);
        let mut heater_on = false;
        let mut chiller_on = false;
        let mut now = 0;
        for (dt, output, fresh) in steps {
            now += dt;
            let cmds = if fresh {
                pair.update(now, signal(0.0, output))
            } else {
                pair.service(now)
            };
            for (ch, on) in cmds {
                match ch {
                    Channel::Heater => heater_on = on,
                    Channel::Chiller => chiller_on = on,
                    Channel::Dose => prop_assert!(false, "thermal pair drove the dose channel"),
                }
                prop_assert!(!(heater_on && chiller_on));
            }
            prop_assert!(!(pair.phase(Channel::Heater) == Some(PolicyPhase::Driving)
                && pair.phase(Channel::Chiller) == Some(PolicyPhase::Driving)));
        }
    }

    #[test]
    fn dose_never_exceeds_the_cap(output in -1e9f64..1e9, error in -14.0f64..14.0) {
        for mode in [DoseMode::Pulse, DoseMode::Continuous] {
            let d = DoseController::new(&dose_cfg(mode), -100.0, 100.0);
            if let Some(ms) = d.dose_ms(ControlSignal { error, output }) {
                prop_assert!(ms > 0 && ms <= 3_000);
            }
        }
    }
}

#[rstest]
fn switching_direction_stops_the_other_side_first() {
    let mut pair = ThermalPair::new(&relay(), ThermalDevices::Both, -100.0, 100.0);
    assert_eq!(pair.update(0, signal(1.0, 50.0)), vec![(Channel::Heater, true)]);
    let cmds = pair.update(1_000, signal(-1.0, -50.0));
    assert_eq!(cmds.first(), Some(&(Channel::Heater, false)));
    assert_eq!(pair.phase(Channel::Chiller), Some(PolicyPhase::Driving));
    assert_eq!(pair.phase(Channel::Heater), Some(PolicyPhase::Cooldown));
}

#[rstest]
fn lost_signal_turns_everything_off() {
    let mut pair = ThermalPair::new(&relay(), ThermalDevices::Heater, -100.0, 100.0);
    pair.update(0, signal(5.0, 80.0));
    assert_eq!(pair.update(500, None), vec![(Channel::Heater, false)]);
    assert_eq!(pair.phase(Channel::Chiller), None);
}

#[rstest]
fn heater_pulse_is_proportional_and_accounted() {
    let mut pair = ThermalPair::new(&relay(), ThermalDevices::Both, -100.0, 100.0);
    pair.update(0, signal(1.0, 40.0));
    // 40% of a 10 s period
    assert!(pair.service(3_999).is_empty());
    assert_eq!(pair.service(4_000), vec![(Channel::Heater, false)]);
    assert_eq!(pair.take_on_time_ms(Channel::Heater, 5_000), 4_000);
    assert_eq!(pair.take_on_time_ms(Channel::Heater, 6_000), 0);
}

#[rstest]
#[case(DoseMode::Pulse, 8.0, -100.0, Some(3_000))]
#[case(DoseMode::Pulse, 8.0, -20.0, Some(2_000))]
#[case(DoseMode::Pulse, 8.0, -0.5, None)]
#[case(DoseMode::Pulse, 6.0, 50.0, None)]
#[case(DoseMode::Continuous, 7.5, 0.0, Some(3_000))]
#[case(DoseMode::Continuous, 6.5, 0.0, None)]
fn dose_length_by_mode(
    #[case] mode: DoseMode,
    #[case] ph: f64,
    #[case] output: f64,
    #[case] expected: Option<u64>,
) {
    let d = DoseController::new(&dose_cfg(mode), -100.0, 100.0);
    // setpoint 7.0
    assert_eq!(d.dose_ms(ControlSignal { error: 7.0 - ph, output }), expected);
}

#[rstest]
#[case(ThermalDevices::Heater, 80.0, Channel::Heater)]
#[case(ThermalDevices::Chiller, -80.0, Channel::Chiller)]
#[case(ThermalDevices::Both, 80.0, Channel::Heater)]
fn reversal_stops_a_single_sided_pair(
    #[case] devices: ThermalDevices,
    #[case] output: f64,
    #[case] channel: Channel,
) {
    let mut pair = ThermalPair::new(&relay(), devices, -100.0, 100.0);
    assert_eq!(pair.update(0, signal(1.0, output)), vec![(channel, true)]);
    let cmds = pair.update(1_000, signal(-1.0, -output));
    assert_eq!(cmds.first(), Some(&(channel, false)));
    assert_eq!(pair.phase(channel), Some(PolicyPhase::Cooldown));
}

#[rstest]
fn reversal_inside_the_threshold_keeps_the_pulse() {
    let mut pair = ThermalPair::new(&relay(), ThermalDevices::Heater, -100.0, 100.0);
    pair.update(0, signal(1.0, 80.0));
    assert!(pair.update(1_000, signal(-0.1, -4.0)).is_empty());
    assert_eq!(pair.phase(Channel::Heater), Some(PolicyPhase::Driving));
}

#[rstest]
fn continuous_dose_stops_once_ph_is_back_on_target() {
    let mut d = DoseController::new(&dose_cfg(DoseMode::Continuous), -100.0, 100.0);
    // pH 7.125 against 7.0 with a lowering doser
    assert_eq!(d.update(0, signal(-0.125, 0.0)), vec![(Channel::Dose, true)]);
    assert!(d.update(1_000, signal(-0.05, 0.0)).is_empty());
    // pH now 6.75: first tick past the setpoint switches off
    assert_eq!(d.update(2_000, signal(0.25, 0.0)), vec![(Channel::Dose, false)]);
    assert_eq!(d.phase(Channel::Dose), Some(PolicyPhase::Cooldown));
    assert_eq!(d.take_on_time_ms(Channel::Dose, 2_500), 2_000);
}

#[rstest]
fn pulse_dose_runs_its_length_after_the_crossing() {
    let mut d = DoseController::new(&dose_cfg(DoseMode::Pulse), -100.0, 100.0);
    assert_eq!(d.update(0, signal(-1.0, -20.0)), vec![(Channel::Dose, true)]);
    assert!(d.update(1_000, signal(0.25, 10.0)).is_empty());
    assert_eq!(d.service(2_000), vec![(Channel::Dose, false)]);
}
