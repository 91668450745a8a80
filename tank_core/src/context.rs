//! Shared state the menu edits and the scheduler drives.
//!
//! Every operator change goes store-first: the record is written, and only
//! when that succeeds is the live value updated. A failed write leaves the
//! old value in force.

use tank_traits::{ProbeKind, RecordStore};

use crate::Timestamp;
use crate::calibration::CalibrationModel;
use crate::config::{ControllerCfg, DoseMode};
use crate::control::ControlLoop;
use crate::error::{CalibrationError, StoreError, ValidationError};
use crate::pid::{PidController, PidGains};
use crate::policy::{DoseController, ThermalPair};
use crate::store::{PersistentStore, RecordId};
use crate::wizard::CalibrationWizard;

pub const TANK_ID_RANGE: (u16, u16) = (1, 99);
pub const LOG_INTERVAL_RANGE: (u32, u32) = (1, 1440);

/// Which PID gain a menu leaf edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    Kp,
    Ki,
    Kd,
}

impl Gain {
    pub fn of(self, g: PidGains) -> f64 {
        match self {
            Gain::Kp => g.kp,
            Gain::Ki => g.ki,
            Gain::Kd => g.kd,
        }
    }

    pub fn with(self, mut g: PidGains, value: f64) -> PidGains {
        match self {
            Gain::Kp => g.kp = value,
            Gain::Ki => g.ki = value,
            Gain::Kd => g.kd = value,
        }
        g
    }
}

pub struct TankContext {
    pub store: Box<dyn RecordStore>,
    pub temperature: ControlLoop<ThermalPair>,
    pub ph: ControlLoop<DoseController>,
    pub wizard: CalibrationWizard,
    pub tank_id: u16,
    pub log_interval_min: u32,
    /// Controller time of the current scheduler pass.
    pub now: Timestamp,
}

impl TankContext {
    pub fn new(cfg: &ControllerCfg, store: Box<dyn RecordStore>) -> Self {
        let t = &cfg.temperature;
        let temperature = ControlLoop::new(
            ProbeKind::Temperature,
            t.control,
            PidController::new(t.pid.gains, t.pid.output_min, t.pid.output_max),
            ThermalPair::new(&t.relay, t.devices, t.pid.output_min, t.pid.output_max),
            t.setpoint,
        );
        let p = &cfg.ph;
        let ph = ControlLoop::new(
            ProbeKind::Ph,
            p.control,
            PidController::new(p.pid.gains, p.pid.output_min, p.pid.output_max),
            DoseController::new(&p.dose, p.pid.output_min, p.pid.output_max),
            p.setpoint,
        );
        Self {
            store,
            temperature,
            ph,
            wizard: CalibrationWizard::new(),
            tank_id: cfg.tank_id,
            log_interval_min: cfg.log_interval_min,
            now: 0,
        }
    }

    /// Load persisted records over the configured defaults. Records that are
    /// missing or out of range are ignored.
    pub fn restore(&mut self) {
        for probe in [ProbeKind::Temperature, ProbeKind::Ph] {
            if let Some(m) = self
                .store
                .get::<CalibrationModel>(RecordId::calibration(probe))
                .filter(CalibrationModel::is_valid)
            {
                self.set_live_calibration(probe, m);
            }
            let (lo, hi) = self.setpoint_range(probe);
            if let Some(sp) = self
                .store
                .get::<f64>(RecordId::setpoint(probe))
                .filter(|v| (lo..=hi).contains(v))
            {
                self.set_live_setpoint(probe, sp);
            }
            if let Some(g) = self
                .store
                .get::<PidGains>(RecordId::pid(probe))
                .filter(|g| g.is_finite() && g.kp >= 0.0 && g.ki >= 0.0 && g.kd >= 0.0)
            {
                self.set_live_gains(probe, g);
            }
        }
        if let Some(mode) = self.store.get::<DoseMode>(RecordId::PhDoseMode) {
            self.ph.policy_mut().set_mode(mode);
        }
        if let Some(id) = self
            .store
            .get::<u16>(RecordId::TankId)
            .filter(|v| (TANK_ID_RANGE.0..=TANK_ID_RANGE.1).contains(v))
        {
            self.tank_id = id;
        }
        if let Some(m) = self
            .store
            .get::<u32>(RecordId::LogInterval)
            .filter(|v| (LOG_INTERVAL_RANGE.0..=LOG_INTERVAL_RANGE.1).contains(v))
        {
            self.log_interval_min = m;
        }
        tracing::info!(
            tank_id = self.tank_id,
            temp_setpoint = self.temperature.setpoint(),
            ph_setpoint = self.ph.setpoint(),
            "persisted settings restored"
        );
    }

    pub fn setpoint_range(&self, probe: ProbeKind) -> (f64, f64) {
        let c = match probe {
            ProbeKind::Temperature => self.temperature.config(),
            ProbeKind::Ph => self.ph.config(),
        };
        (c.min, c.max)
    }

    pub fn setpoint(&self, probe: ProbeKind) -> f64 {
        match probe {
            ProbeKind::Temperature => self.temperature.setpoint(),
            ProbeKind::Ph => self.ph.setpoint(),
        }
    }

    pub fn gains(&self, probe: ProbeKind) -> PidGains {
        match probe {
            ProbeKind::Temperature => self.temperature.gains(),
            ProbeKind::Ph => self.ph.gains(),
        }
    }

    pub fn calibration(&self, probe: ProbeKind) -> &CalibrationModel {
        match probe {
            ProbeKind::Temperature => self.temperature.calibration(),
            ProbeKind::Ph => self.ph.calibration(),
        }
    }

    /// Current value for display, `None` while reads fail.
    pub fn value(&self, probe: ProbeKind) -> Option<f64> {
        match probe {
            ProbeKind::Temperature => self.temperature.value(),
            ProbeKind::Ph => self.ph.value(),
        }
    }

    pub fn dose_mode(&self) -> DoseMode {
        self.ph.policy().mode()
    }

    /// Control of `probe` is held off while it is being calibrated.
    pub fn is_suspended(&self, probe: ProbeKind) -> bool {
        self.wizard.active_session() == Some(probe)
    }

    fn set_live_setpoint(&mut self, probe: ProbeKind, v: f64) {
        match probe {
            ProbeKind::Temperature => self.temperature.set_setpoint(v),
            ProbeKind::Ph => self.ph.set_setpoint(v),
        }
    }

    fn set_live_gains(&mut self, probe: ProbeKind, g: PidGains) {
        match probe {
            ProbeKind::Temperature => self.temperature.set_gains(g),
            ProbeKind::Ph => self.ph.set_gains(g),
        }
    }

    fn set_live_calibration(&mut self, probe: ProbeKind, m: CalibrationModel) {
        match probe {
            ProbeKind::Temperature => self.temperature.set_calibration(m),
            ProbeKind::Ph => self.ph.set_calibration(m),
        }
    }

    // ── operator changes ───────────────────────────────────────────────────

    pub fn commit_setpoint(&mut self, probe: ProbeKind, v: f64) -> Result<(), ValidationError> {
        self.store.put(RecordId::setpoint(probe), &v)?;
        self.set_live_setpoint(probe, v);
        Ok(())
    }

    pub fn commit_gain(
        &mut self,
        probe: ProbeKind,
        gain: Gain,
        v: f64,
    ) -> Result<(), ValidationError> {
        let gains = gain.with(self.gains(probe), v);
        self.store.put(RecordId::pid(probe), &gains)?;
        self.set_live_gains(probe, gains);
        Ok(())
    }

    pub fn commit_tank_id(&mut self, v: f64) -> Result<(), ValidationError> {
        let id = v as u16;
        self.store.put(RecordId::TankId, &id)?;
        tracing::info!(tank_id = id, "tank id changed");
        self.tank_id = id;
        Ok(())
    }

    pub fn commit_log_interval(&mut self, v: f64) -> Result<(), ValidationError> {
        let minutes = v as u32;
        self.store.put(RecordId::LogInterval, &minutes)?;
        tracing::info!(minutes, "log interval changed");
        self.log_interval_min = minutes;
        Ok(())
    }

    pub fn toggle_dose_mode(&mut self) -> Result<DoseMode, StoreError> {
        let mode = self.dose_mode().toggled();
        self.store.put(RecordId::PhDoseMode, &mode)?;
        tracing::info!(mode = ?mode, "dose mode changed");
        self.ph.policy_mut().set_mode(mode);
        Ok(mode)
    }

    /// Reset `probe` to the identity calibration.
    pub fn clear_calibration(&mut self, probe: ProbeKind) -> Result<(), StoreError> {
        let model = CalibrationModel::identity();
        self.store.put(RecordId::calibration(probe), &model)?;
        tracing::info!(probe = probe.as_str(), "calibration cleared");
        self.set_live_calibration(probe, model);
        Ok(())
    }

    // ── calibration session ────────────────────────────────────────────────

    pub fn begin_calibration(&mut self, probe: ProbeKind) -> Result<(), CalibrationError> {
        self.wizard.begin_session(probe)
    }

    /// Capture the probe's latest fresh raw reading against `reference`.
    pub fn capture_calibration(&mut self, reference: f64) -> Result<(), ValidationError> {
        let probe = self
            .wizard
            .active_session()
            .ok_or(CalibrationError::NoSession)?;
        let raw = match probe {
            ProbeKind::Temperature => self.temperature.fresh_raw(self.now),
            ProbeKind::Ph => self.ph.fresh_raw(self.now),
        }
        .ok_or(CalibrationError::NoReading)?;
        self.wizard.capture_reading(raw, reference)?;
        Ok(())
    }

    /// Fit, persist and apply the session's model.
    pub fn confirm_calibration(&mut self) -> Result<CalibrationModel, CalibrationError> {
        let probe = self
            .wizard
            .active_session()
            .ok_or(CalibrationError::NoSession)?;
        let model = self.wizard.confirm(&mut self.store, self.now)?;
        self.set_live_calibration(probe, model);
        Ok(model)
    }

    pub fn abort_calibration(&mut self) -> bool {
        self.wizard.abort()
    }
}
