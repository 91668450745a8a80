//! Configuration types for the control engine.
//!
//! These are the runtime structs used by the control loops, policies and
//! menu. They are separate from the TOML-deserialized config in
//! `tank_config`; defaults come from there so the two never drift apart.

use serde::{Deserialize, Serialize};

use crate::pid::PidGains;

/// Gains plus output clamp for one PID loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidCfg {
    pub gains: PidGains,
    pub output_min: f64,
    pub output_max: f64,
}

/// Scheduling and sanity bounds shared by both control loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopCfg {
    pub tick_ms: u64,
    /// A reading older than this is stale and forces the outputs off.
    pub stale_ms: u64,
    /// Accepted setpoint range.
    pub min: f64,
    pub max: f64,
    /// Moving-average window over calibrated values (1 = disabled).
    pub smoothing_window: usize,
}

/// Which thermal equipment is fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThermalDevices {
    Heater,
    Chiller,
    #[default]
    Both,
}

impl ThermalDevices {
    pub fn has_heater(self) -> bool {
        matches!(self, ThermalDevices::Heater | ThermalDevices::Both)
    }

    pub fn has_chiller(self) -> bool {
        matches!(self, ThermalDevices::Chiller | ThermalDevices::Both)
    }
}

/// Time-proportioning relay settings for heater and chiller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayCfg {
    pub threshold: f64,
    pub period_ms: u64,
    pub min_on_ms: u64,
    pub heater_min_off_ms: u64,
    pub chiller_min_off_ms: u64,
}

/// Which way a dose moves pH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoseDirection {
    /// CO2 injection.
    #[default]
    Lower,
    Raise,
}

/// pH dosing mode. Persisted, toggled from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseMode {
    /// PID-sized pulses.
    #[default]
    Pulse,
    /// Plain on/off around the setpoint.
    Continuous,
}

impl DoseMode {
    pub fn toggled(self) -> Self {
        match self {
            DoseMode::Pulse => DoseMode::Continuous,
            DoseMode::Continuous => DoseMode::Pulse,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DoseMode::Pulse => "PID on",
            DoseMode::Continuous => "PID off",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseCfg {
    pub period_ms: u64,
    /// Hard cap on on-time per period regardless of controller output.
    pub max_dose_ms: u64,
    pub min_off_ms: u64,
    pub threshold: f64,
    pub direction: DoseDirection,
    pub mode: DoseMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureCfg {
    pub setpoint: f64,
    pub control: LoopCfg,
    pub pid: PidCfg,
    pub devices: ThermalDevices,
    pub relay: RelayCfg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhCfg {
    pub setpoint: f64,
    pub control: LoopCfg,
    pub pid: PidCfg,
    pub dose: DoseCfg,
}

/// Everything the scheduler needs to build a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerCfg {
    pub tank_id: u16,
    pub line_width: usize,
    /// 0 disables the menu idle timeout.
    pub idle_timeout_ms: u64,
    /// Max sensor wait per read (ms).
    pub sensor_timeout_ms: u64,
    pub log_interval_min: u32,
    pub temperature: TemperatureCfg,
    pub ph: PhCfg,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self::from(&tank_config::Config::default())
    }
}

impl ControllerCfg {
    /// Reject settings the engine cannot run with.
    pub fn check(&self) -> Result<(), crate::error::BuildError> {
        use crate::error::BuildError::InvalidConfig;
        if self.line_width < 8 {
            return Err(InvalidConfig("line_width must be >= 8"));
        }
        if self.sensor_timeout_ms == 0 {
            return Err(InvalidConfig("sensor_timeout_ms must be >= 1"));
        }
        for c in [&self.temperature.control, &self.ph.control] {
            if c.tick_ms == 0 {
                return Err(InvalidConfig("tick_ms must be >= 1"));
            }
            if c.min >= c.max {
                return Err(InvalidConfig("setpoint range is empty"));
            }
        }
        for p in [&self.temperature.pid, &self.ph.pid] {
            if !p.gains.is_finite() || p.output_min >= p.output_max {
                return Err(InvalidConfig("pid gains/limits invalid"));
            }
        }
        if self.temperature.relay.period_ms == 0 || self.ph.dose.period_ms == 0 {
            return Err(InvalidConfig("actuator period must be >= 1"));
        }
        if self.ph.dose.max_dose_ms == 0 {
            return Err(InvalidConfig("max_dose_ms must be >= 1"));
        }
        Ok(())
    }
}
