//! Actuator policies: turn PID output into relay/solenoid commands.
//!
//! Every output channel runs the same three-phase cycle:
//!
//! ```text
//!  Idle ──demand──▶ Driving ──on-time spent──▶ Cooldown ──min off elapsed──▶ Idle
//!                      │                          ▲
//!                      └────── forced stop ───────┘
//! ```
//!
//! A pulse that runs to completion rests for the remainder of its control
//! period (at least `min_off`), so on-time per period never exceeds the pulse
//! length. Commands are returned switch-offs first; callers apply them in
//! order, which keeps heater and chiller from overlapping even for one write.

use tank_traits::Channel;

use crate::Timestamp;
use crate::config::{DoseCfg, DoseDirection, DoseMode, RelayCfg, ThermalDevices};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyPhase {
    #[default]
    Idle,
    Driving,
    Cooldown,
}

/// Controller decision for one tick. `error` is `setpoint - value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSignal {
    pub error: f64,
    pub output: f64,
}

/// (channel, on) in the order it must be written.
pub type Command = (Channel, bool);

/// On/off timing for one physical channel.
#[derive(Debug, Clone)]
pub struct PulseGate {
    channel: Channel,
    phase: PolicyPhase,
    started_at: Timestamp,
    pulse_ms: u64,
    // on-time before this instant has already been accounted
    counted_from: Timestamp,
    resume_at: Timestamp,
    period_ms: u64,
    min_off_ms: u64,
    on_time_ms: u64,
}

impl PulseGate {
    pub fn new(channel: Channel, period_ms: u64, min_off_ms: u64) -> Self {
        Self {
            channel,
            phase: PolicyPhase::Idle,
            started_at: 0,
            pulse_ms: 0,
            counted_from: 0,
            resume_at: 0,
            period_ms,
            min_off_ms,
            on_time_ms: 0,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn phase(&self) -> PolicyPhase {
        self.phase
    }

    pub fn is_driving(&self) -> bool {
        self.phase == PolicyPhase::Driving
    }

    /// Start a pulse. Only allowed from Idle; a zero-length pulse is ignored.
    pub fn start(&mut self, now: Timestamp, pulse_ms: u64) -> Option<Command> {
        if self.phase != PolicyPhase::Idle || pulse_ms == 0 {
            return None;
        }
        self.phase = PolicyPhase::Driving;
        self.started_at = now;
        self.counted_from = now;
        self.pulse_ms = pulse_ms;
        tracing::debug!(channel = self.channel.as_str(), pulse_ms, "pulse start");
        Some((self.channel, true))
    }

    /// Advance time: end an expired pulse, leave an elapsed cooldown.
    pub fn service(&mut self, now: Timestamp) -> Option<Command> {
        match self.phase {
            PolicyPhase::Driving if now >= self.started_at.saturating_add(self.pulse_ms) => {
                let rest = self
                    .period_ms
                    .saturating_sub(self.pulse_ms)
                    .max(self.min_off_ms);
                Some(self.finish(now, rest))
            }
            PolicyPhase::Cooldown if now >= self.resume_at => {
                self.phase = PolicyPhase::Idle;
                None
            }
            _ => None,
        }
    }

    /// Cut a running pulse short. Cooldown is just `min_off`.
    pub fn stop(&mut self, now: Timestamp) -> Option<Command> {
        if self.phase != PolicyPhase::Driving {
            return None;
        }
        Some(self.finish(now, self.min_off_ms))
    }

    fn finish(&mut self, now: Timestamp, rest_ms: u64) -> Command {
        self.on_time_ms = self
            .on_time_ms
            .saturating_add(now.saturating_sub(self.counted_from));
        self.phase = PolicyPhase::Cooldown;
        self.resume_at = now.saturating_add(rest_ms);
        tracing::debug!(channel = self.channel.as_str(), rest_ms, "pulse end");
        (self.channel, false)
    }

    /// Accumulated on-time since the last call.
    pub fn take_on_time_ms(&mut self, now: Timestamp) -> u64 {
        let mut total = std::mem::take(&mut self.on_time_ms);
        if self.phase == PolicyPhase::Driving {
            total = total.saturating_add(now.saturating_sub(self.counted_from));
            self.counted_from = now;
        }
        total
    }
}

/// Drive-decision capability shared by the thermal pair and the doser.
pub trait ActuatorPolicy {
    /// Apply a fresh decision. `None` means the input was unusable and every
    /// channel must go off.
    fn update(&mut self, now: Timestamp, signal: Option<ControlSignal>) -> Vec<Command>;

    /// Let time pass without a new decision.
    fn service(&mut self, now: Timestamp) -> Vec<Command>;

    /// Switch every channel off now.
    fn force_off(&mut self, now: Timestamp) -> Vec<Command>;

    /// Phase of `channel`, `None` when this policy does not own it.
    fn phase(&self, channel: Channel) -> Option<PolicyPhase>;

    /// On-time of `channel` since the previous call.
    fn take_on_time_ms(&mut self, channel: Channel, now: Timestamp) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalKind {
    Heater,
    Chiller,
}

/// One side of the thermal pair: heater drives on positive output, chiller
/// on negative.
#[derive(Debug, Clone)]
pub struct ThermalPolicy {
    kind: ThermalKind,
    gate: PulseGate,
    threshold: f64,
    period_ms: u64,
    min_on_ms: u64,
    full_scale: f64,
}

impl ThermalPolicy {
    pub fn heater(cfg: &RelayCfg, output_max: f64) -> Self {
        Self {
            kind: ThermalKind::Heater,
            gate: PulseGate::new(Channel::Heater, cfg.period_ms, cfg.heater_min_off_ms),
            threshold: cfg.threshold,
            period_ms: cfg.period_ms,
            min_on_ms: cfg.min_on_ms,
            full_scale: output_max.abs(),
        }
    }

    pub fn chiller(cfg: &RelayCfg, output_min: f64) -> Self {
        Self {
            kind: ThermalKind::Chiller,
            gate: PulseGate::new(Channel::Chiller, cfg.period_ms, cfg.chiller_min_off_ms),
            threshold: cfg.threshold,
            period_ms: cfg.period_ms,
            min_on_ms: cfg.min_on_ms,
            full_scale: output_min.abs(),
        }
    }

    pub fn kind(&self) -> ThermalKind {
        self.kind
    }

    pub fn phase(&self) -> PolicyPhase {
        self.gate.phase()
    }

    /// Pulse length for `output`, `None` when below threshold.
    pub fn demand_ms(&self, output: f64) -> Option<u64> {
        let drive = match self.kind {
            ThermalKind::Heater => output,
            ThermalKind::Chiller => -output,
        };
        if drive.is_nan() || drive <= self.threshold {
            return None;
        }
        let fraction = if self.full_scale > 0.0 {
            (drive / self.full_scale).min(1.0)
        } else {
            1.0
        };
        let ms = (self.period_ms as f64 * fraction).round() as u64;
        Some(ms.clamp(self.min_on_ms.min(self.period_ms), self.period_ms))
    }
}

/// Heater and chiller sharing one setpoint. At most one of them is ever in
/// `Driving`.
#[derive(Debug, Clone)]
pub struct ThermalPair {
    heater: Option<ThermalPolicy>,
    chiller: Option<ThermalPolicy>,
    threshold: f64,
}

impl ThermalPair {
    pub fn new(cfg: &RelayCfg, devices: ThermalDevices, output_min: f64, output_max: f64) -> Self {
        Self {
            heater: devices
                .has_heater()
                .then(|| ThermalPolicy::heater(cfg, output_max)),
            chiller: devices
                .has_chiller()
                .then(|| ThermalPolicy::chiller(cfg, output_min)),
            threshold: cfg.threshold,
        }
    }

    fn side(&self, kind: ThermalKind) -> Option<&ThermalPolicy> {
        match kind {
            ThermalKind::Heater => self.heater.as_ref(),
            ThermalKind::Chiller => self.chiller.as_ref(),
        }
    }

    fn side_mut(&mut self, kind: ThermalKind) -> Option<&mut ThermalPolicy> {
        match kind {
            ThermalKind::Heater => self.heater.as_mut(),
            ThermalKind::Chiller => self.chiller.as_mut(),
        }
    }

    fn drive(
        &mut self,
        kind: ThermalKind,
        now: Timestamp,
        output: f64,
        cmds: &mut Vec<Command>,
    ) {
        let (toward, other) = match kind {
            ThermalKind::Heater => (output, ThermalKind::Chiller),
            ThermalKind::Chiller => (-output, ThermalKind::Heater),
        };
        if toward.is_nan() || toward <= self.threshold {
            return;
        }
        // past the threshold toward `kind`: the opposite side stops even when
        // `kind` is not fitted, then this one may start
        if let Some(cmd) = self.side_mut(other).and_then(|p| p.gate.stop(now)) {
            cmds.push(cmd);
        }
        let Some(demand) = self.side(kind).and_then(|p| p.demand_ms(output)) else {
            return;
        };
        if let Some(cmd) = self.side_mut(kind).and_then(|p| p.gate.start(now, demand)) {
            cmds.push(cmd);
        }
    }

    fn gates_mut(&mut self) -> impl Iterator<Item = &mut PulseGate> {
        self.heater
            .iter_mut()
            .chain(self.chiller.iter_mut())
            .map(|p| &mut p.gate)
    }
}

impl ActuatorPolicy for ThermalPair {
    fn update(&mut self, now: Timestamp, signal: Option<ControlSignal>) -> Vec<Command> {
        let mut cmds = self.service(now);
        let Some(signal) = signal else {
            cmds.extend(self.force_off(now));
            return cmds;
        };
        if signal.output > 0.0 {
            self.drive(ThermalKind::Heater, now, signal.output, &mut cmds);
        } else if signal.output < 0.0 {
            self.drive(ThermalKind::Chiller, now, signal.output, &mut cmds);
        }
        cmds
    }

    fn service(&mut self, now: Timestamp) -> Vec<Command> {
        self.gates_mut().filter_map(|g| g.service(now)).collect()
    }

    fn force_off(&mut self, now: Timestamp) -> Vec<Command> {
        self.gates_mut().filter_map(|g| g.stop(now)).collect()
    }

    fn phase(&self, channel: Channel) -> Option<PolicyPhase> {
        match channel {
            Channel::Heater => self.heater.as_ref().map(ThermalPolicy::phase),
            Channel::Chiller => self.chiller.as_ref().map(ThermalPolicy::phase),
            Channel::Dose => None,
        }
    }

    fn take_on_time_ms(&mut self, channel: Channel, now: Timestamp) -> u64 {
        self.gates_mut()
            .find(|g| g.channel() == channel)
            .map_or(0, |g| g.take_on_time_ms(now))
    }
}

/// pH dosing: a pulse per period sized by the controller, capped at
/// `max_dose_ms` whatever the gains say.
#[derive(Debug, Clone)]
pub struct DoseController {
    gate: PulseGate,
    direction: DoseDirection,
    mode: DoseMode,
    threshold: f64,
    period_ms: u64,
    max_dose_ms: u64,
    full_scale: f64,
}

impl DoseController {
    pub fn new(cfg: &DoseCfg, output_min: f64, output_max: f64) -> Self {
        let full_scale = match cfg.direction {
            DoseDirection::Lower => output_min.abs(),
            DoseDirection::Raise => output_max.abs(),
        };
        Self {
            gate: PulseGate::new(Channel::Dose, cfg.period_ms, cfg.min_off_ms),
            direction: cfg.direction,
            mode: cfg.mode,
            threshold: cfg.threshold,
            period_ms: cfg.period_ms,
            max_dose_ms: cfg.max_dose_ms.min(cfg.period_ms),
            full_scale,
        }
    }

    pub fn mode(&self) -> DoseMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DoseMode) {
        self.mode = mode;
    }

    pub fn max_dose_ms(&self) -> u64 {
        self.max_dose_ms
    }

    /// Dose length for this signal, `None` when no dose is wanted.
    pub fn dose_ms(&self, signal: ControlSignal) -> Option<u64> {
        let sign = match self.direction {
            DoseDirection::Lower => -1.0,
            DoseDirection::Raise => 1.0,
        };
        match self.mode {
            DoseMode::Continuous => (sign * signal.error > 0.0).then_some(self.max_dose_ms),
            DoseMode::Pulse => {
                let drive = sign * signal.output;
                if drive.is_nan() || drive <= self.threshold {
                    return None;
                }
                let fraction = if self.full_scale > 0.0 {
                    (drive / self.full_scale).min(1.0)
                } else {
                    1.0
                };
                let ms = (self.period_ms as f64 * fraction).round() as u64;
                Some(ms.min(self.max_dose_ms)).filter(|&ms| ms > 0)
            }
        }
    }
}

impl ActuatorPolicy for DoseController {
    fn update(&mut self, now: Timestamp, signal: Option<ControlSignal>) -> Vec<Command> {
        let mut cmds = self.service(now);
        match signal {
            None => cmds.extend(self.force_off(now)),
            Some(signal) => match self.dose_ms(signal) {
                Some(ms) => {
                    if let Some(cmd) = self.gate.start(now, ms) {
                        tracing::debug!(dose_ms = ms, mode = ?self.mode, "dose");
                        cmds.push(cmd);
                    }
                }
                // continuous dosing ends as soon as pH is back on target
                None if self.mode == DoseMode::Continuous => {
                    if let Some(cmd) = self.gate.stop(now) {
                        tracing::debug!("setpoint reached; dose stopped");
                        cmds.push(cmd);
                    }
                }
                None => {}
            },
        }
        cmds
    }

    fn service(&mut self, now: Timestamp) -> Vec<Command> {
        self.gate.service(now).into_iter().collect()
    }

    fn force_off(&mut self, now: Timestamp) -> Vec<Command> {
        self.gate.stop(now).into_iter().collect()
    }

    fn phase(&self, channel: Channel) -> Option<PolicyPhase> {
        (channel == Channel::Dose).then(|| self.gate.phase())
    }

    fn take_on_time_ms(&mut self, channel: Channel, now: Timestamp) -> u64 {
        if channel == Channel::Dose {
            self.gate.take_on_time_ms(now)
        } else {
            0
        }
    }
}
