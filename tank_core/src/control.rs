//! One closed control loop: probe → calibration → PID → actuator policy.
//!
//! A loop only acts when its tick interval has elapsed. Any failed,
//! timed-out or non-finite read forces the policy off without ticking the
//! PID; the last good value is kept for display only.

use std::time::Duration;

use tank_traits::{Actuator, ProbeKind, ProbeReader};

use crate::Timestamp;
use crate::calibration::CalibrationModel;
use crate::config::LoopCfg;
use crate::error::ReadError;
use crate::filter::MovingAverage;
use crate::hw_error::map_read_error;
use crate::pid::{PidController, PidGains};
use crate::policy::{ActuatorPolicy, Command, ControlSignal};

/// pH probes compensate with this temperature when the tank value is unusable.
pub const DEFAULT_COMPENSATION_C: f64 = 20.0;

/// Temperature forwarded to the pH probe for `celsius`.
pub fn compensation_celsius(celsius: f64) -> f64 {
    if celsius > 0.0 && celsius < 100.0 {
        celsius
    } else {
        DEFAULT_COMPENSATION_C
    }
}

/// A value with the controller time it was taken at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub value: f64,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Interval not elapsed; only pulse timing was serviced.
    NotDue,
    Controlled { value: f64, output: f64 },
    /// Read succeeded but control is held off (calibration in progress).
    Suspended { value: f64 },
    FailSafe(ReadError),
}

#[derive(Debug)]
pub struct ControlLoop<P> {
    probe: ProbeKind,
    cfg: LoopCfg,
    pid: PidController,
    policy: P,
    setpoint: f64,
    calibration: CalibrationModel,
    smoothing: MovingAverage,
    last_raw: Option<SensorReading>,
    last_value: Option<SensorReading>,
    last_tick: Option<Timestamp>,
    last_error: Option<ReadError>,
    last_output: f64,
}

impl<P: ActuatorPolicy> ControlLoop<P> {
    pub fn new(
        probe: ProbeKind,
        cfg: LoopCfg,
        pid: PidController,
        policy: P,
        setpoint: f64,
    ) -> Self {
        Self {
            probe,
            smoothing: MovingAverage::new(cfg.smoothing_window),
            cfg,
            pid,
            policy,
            setpoint,
            calibration: CalibrationModel::identity(),
            last_raw: None,
            last_value: None,
            last_tick: None,
            last_error: None,
            last_output: 0.0,
        }
    }

    pub fn due(&self, now: Timestamp) -> bool {
        self.last_tick
            .is_none_or(|t| now.saturating_sub(t) >= self.cfg.tick_ms)
    }

    /// Run one control step if due. `suspended` holds the outputs off while
    /// still taking readings.
    pub fn tick(
        &mut self,
        now: Timestamp,
        probes: &mut dyn ProbeReader,
        actuator: &mut dyn Actuator,
        timeout: Duration,
        suspended: bool,
    ) -> TickOutcome {
        if !self.due(now) {
            self.service(now, actuator);
            return TickOutcome::NotDue;
        }
        self.last_tick = Some(now);

        let value = match self.read(now, probes, timeout) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(probe = self.probe.as_str(), error = %e, "read failed; outputs off");
                self.last_error = Some(e.clone());
                let cmds = self.policy.update(now, None);
                apply(actuator, &cmds);
                return TickOutcome::FailSafe(e);
            }
        };
        self.last_error = None;

        if suspended {
            let cmds = self.policy.force_off(now);
            apply(actuator, &cmds);
            return TickOutcome::Suspended { value };
        }

        let output = self.pid.tick(value, self.setpoint, now);
        self.last_output = output;
        let signal = ControlSignal {
            error: self.setpoint - value,
            output,
        };
        tracing::trace!(probe = self.probe.as_str(), value, setpoint = self.setpoint, output, "control tick");
        let cmds = self.policy.update(now, Some(signal));
        apply(actuator, &cmds);
        TickOutcome::Controlled { value, output }
    }

    fn read(
        &mut self,
        now: Timestamp,
        probes: &mut dyn ProbeReader,
        timeout: Duration,
    ) -> Result<f64, ReadError> {
        let raw = probes
            .read(self.probe, timeout)
            .map_err(|e| map_read_error(e.as_ref()))?;
        if !raw.is_finite() {
            return Err(ReadError::NonFinite);
        }
        self.last_raw = Some(SensorReading { value: raw, at: now });
        let value = self.smoothing.push(self.calibration.apply(raw));
        if !value.is_finite() {
            self.smoothing.clear();
            return Err(ReadError::NonFinite);
        }
        self.last_value = Some(SensorReading { value, at: now });
        Ok(value)
    }

    /// Service pulse timing between ticks; a stale reading forces off.
    pub fn service(&mut self, now: Timestamp, actuator: &mut dyn Actuator) {
        let mut cmds = self.policy.service(now);
        if self.is_stale(now) {
            cmds.extend(self.policy.force_off(now));
        }
        apply(actuator, &cmds);
    }

    /// Switch every channel of this loop off now.
    pub fn force_off(&mut self, now: Timestamp, actuator: &mut dyn Actuator) {
        let cmds = self.policy.force_off(now);
        apply(actuator, &cmds);
    }

    /// No good reading, or the last one is older than `stale_ms`.
    pub fn is_stale(&self, now: Timestamp) -> bool {
        self.last_value
            .is_none_or(|r| now.saturating_sub(r.at) > self.cfg.stale_ms)
    }

    pub fn probe(&self) -> ProbeKind {
        self.probe
    }

    pub fn config(&self) -> &LoopCfg {
        &self.cfg
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        tracing::info!(probe = self.probe.as_str(), setpoint, "setpoint changed");
        self.setpoint = setpoint;
    }

    pub fn gains(&self) -> PidGains {
        self.pid.gains()
    }

    /// Live gain change; resets the integral.
    pub fn set_gains(&mut self, gains: PidGains) {
        tracing::info!(probe = self.probe.as_str(), kp = gains.kp, ki = gains.ki, kd = gains.kd, "gains changed");
        self.pid.set_gains(gains);
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn calibration(&self) -> &CalibrationModel {
        &self.calibration
    }

    /// Swap the calibration. Smoothing and PID history restart since both
    /// hold values in the previous scale.
    pub fn set_calibration(&mut self, model: CalibrationModel) {
        self.calibration = model;
        self.smoothing.clear();
        self.pid.reset();
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn last_raw(&self) -> Option<SensorReading> {
        self.last_raw
    }

    /// Latest raw reading if no newer read has failed and it is not stale.
    pub fn fresh_raw(&self, now: Timestamp) -> Option<f64> {
        if self.last_error.is_some() || self.is_stale(now) {
            return None;
        }
        self.last_raw.map(|r| r.value)
    }

    /// Last good calibrated value, kept across failures.
    pub fn last_value(&self) -> Option<SensorReading> {
        self.last_value
    }

    /// Value to show and log; `None` while reads are failing.
    pub fn value(&self) -> Option<f64> {
        if self.last_error.is_some() {
            return None;
        }
        self.last_value.map(|r| r.value)
    }

    pub fn last_error(&self) -> Option<&ReadError> {
        self.last_error.as_ref()
    }

    pub fn last_output(&self) -> f64 {
        self.last_output
    }
}

fn apply(actuator: &mut dyn Actuator, cmds: &[Command]) {
    for &(channel, on) in cmds {
        if let Err(e) = actuator.set_drive(channel, on) {
            tracing::warn!(channel = channel.as_str(), on, error = %e, "actuator write failed");
        } else {
            tracing::debug!(channel = channel.as_str(), on, "actuator");
        }
    }
}
