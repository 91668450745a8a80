//! `From` implementations bridging `tank_config` types to `tank_core` types.

use crate::calibration::{CalibrationModel, CalibrationPoint};
use crate::config::{
    ControllerCfg, DoseCfg, DoseDirection, DoseMode, LoopCfg, PhCfg, PidCfg, RelayCfg,
    TemperatureCfg, ThermalDevices,
};
use crate::error::CalibrationError;
use crate::pid::PidGains;

// ── PID ──────────────────────────────────────────────────────────────────────

impl From<&tank_config::PidCfg> for PidCfg {
    fn from(c: &tank_config::PidCfg) -> Self {
        Self {
            gains: PidGains::new(c.kp, c.ki, c.kd),
            output_min: c.output_min,
            output_max: c.output_max,
        }
    }
}

// ── Temperature ──────────────────────────────────────────────────────────────

impl From<tank_config::ThermalDevices> for ThermalDevices {
    fn from(d: tank_config::ThermalDevices) -> Self {
        match d {
            tank_config::ThermalDevices::Heater => ThermalDevices::Heater,
            tank_config::ThermalDevices::Chiller => ThermalDevices::Chiller,
            tank_config::ThermalDevices::Both => ThermalDevices::Both,
        }
    }
}

impl From<&tank_config::RelayCfg> for RelayCfg {
    fn from(c: &tank_config::RelayCfg) -> Self {
        Self {
            threshold: c.threshold,
            period_ms: c.period_ms,
            min_on_ms: c.min_on_ms,
            heater_min_off_ms: c.heater_min_off_ms,
            chiller_min_off_ms: c.chiller_min_off_ms,
        }
    }
}

impl From<&tank_config::TemperatureCfg> for TemperatureCfg {
    fn from(c: &tank_config::TemperatureCfg) -> Self {
        Self {
            setpoint: c.setpoint_c,
            control: LoopCfg {
                tick_ms: c.tick_ms,
                stale_ms: c.stale_ms,
                min: c.min_c,
                max: c.max_c,
                smoothing_window: c.smoothing_window,
            },
            pid: PidCfg::from(&c.pid),
            devices: c.devices.into(),
            relay: RelayCfg::from(&c.relay),
        }
    }
}

// ── pH ───────────────────────────────────────────────────────────────────────

impl From<tank_config::DoseDirection> for DoseDirection {
    fn from(d: tank_config::DoseDirection) -> Self {
        match d {
            tank_config::DoseDirection::Lower => DoseDirection::Lower,
            tank_config::DoseDirection::Raise => DoseDirection::Raise,
        }
    }
}

impl From<tank_config::DoseModeCfg> for DoseMode {
    fn from(m: tank_config::DoseModeCfg) -> Self {
        match m {
            tank_config::DoseModeCfg::Pulse => DoseMode::Pulse,
            tank_config::DoseModeCfg::Continuous => DoseMode::Continuous,
        }
    }
}

impl From<&tank_config::DoseCfg> for DoseCfg {
    fn from(c: &tank_config::DoseCfg) -> Self {
        Self {
            period_ms: c.period_ms,
            max_dose_ms: c.max_dose_ms,
            min_off_ms: c.min_off_ms,
            threshold: c.threshold,
            direction: c.direction.into(),
            mode: c.mode.into(),
        }
    }
}

impl From<&tank_config::PhCfg> for PhCfg {
    fn from(c: &tank_config::PhCfg) -> Self {
        Self {
            setpoint: c.setpoint,
            control: LoopCfg {
                tick_ms: c.tick_ms,
                stale_ms: c.stale_ms,
                min: c.min,
                max: c.max,
                // pH probes average internally
                smoothing_window: 1,
            },
            pid: PidCfg::from(&c.pid),
            dose: DoseCfg::from(&c.dose),
        }
    }
}

// ── Whole config ─────────────────────────────────────────────────────────────

impl From<&tank_config::Config> for ControllerCfg {
    fn from(c: &tank_config::Config) -> Self {
        Self {
            tank_id: c.tank.id,
            line_width: c.display.line_width,
            idle_timeout_ms: c.menu.idle_timeout_ms,
            sensor_timeout_ms: c.hardware.sensor_read_timeout_ms,
            log_interval_min: c.logging.interval_min,
            temperature: TemperatureCfg::from(&c.temperature),
            ph: PhCfg::from(&c.ph),
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&tank_config::CalibrationRow> for CalibrationPoint {
    fn from(r: &tank_config::CalibrationRow) -> Self {
        CalibrationPoint::new(r.raw, r.reference)
    }
}

/// Fit a model from CSV rows. `computed_at` is left for the caller to stamp.
impl TryFrom<&[tank_config::CalibrationRow]> for CalibrationModel {
    type Error = CalibrationError;

    fn try_from(rows: &[tank_config::CalibrationRow]) -> Result<Self, Self::Error> {
        let points: Vec<CalibrationPoint> = rows.iter().map(CalibrationPoint::from).collect();
        let fit = crate::calibration::fit(&points)?;
        Ok(CalibrationModel {
            slope: fit.slope,
            intercept: fit.intercept,
            computed_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_over() {
        let cfg = ControllerCfg::default();
        assert_eq!(cfg.tank_id, 1);
        assert_eq!(cfg.ph.dose.mode, DoseMode::Pulse);
        assert_eq!(cfg.temperature.devices, ThermalDevices::Both);
        assert!(cfg.check().is_ok());
    }

    #[test]
    fn csv_rows_fit_through_core() {
        let rows = [
            tank_config::CalibrationRow {
                raw: 0.0,
                reference: 1.0,
            },
            tank_config::CalibrationRow {
                raw: 10.0,
                reference: 21.0,
            },
        ];
        let m = CalibrationModel::try_from(&rows[..]).unwrap();
        assert!((m.slope - 2.0).abs() < 1e-12);
        assert!((m.intercept - 1.0).abs() < 1e-12);
    }
}
