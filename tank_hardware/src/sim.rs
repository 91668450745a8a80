//! Simulated tank: water temperature and pH that respond to the relays.
//!
//! One shared model with two handles: [`SimulatedProbes`] reads it,
//! [`SimulatedRelays`] drives it. The model integrates on the supplied clock,
//! so a `TestClock` gives fully deterministic runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tank_traits::clock::Clock;
use tank_traits::{Actuator, BoxError, Channel, ProbeKind, ProbeReader};

use crate::error::HwError;

/// Raw count the simulated pH probe reports at pH 4.
pub const PH_RAW_AT_4: f64 = 3000.0;
/// Raw counts per pH unit (falls as pH rises).
pub const PH_RAW_PER_UNIT: f64 = -1000.0 / 3.0;

/// Raw pH probe output for a true pH value.
pub fn ph_to_raw(ph: f64) -> f64 {
    PH_RAW_AT_4 + (ph - 4.0) * PH_RAW_PER_UNIT
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimSettings {
    pub temperature_c: f64,
    pub ambient_c: f64,
    pub ph: f64,
    /// pH the water drifts back to without dosing.
    pub ph_equilibrium: f64,
    pub heater_c_per_min: f64,
    pub chiller_c_per_min: f64,
    /// Fraction of the gap to ambient closed per minute.
    pub ambient_loss_per_min: f64,
    pub dose_ph_per_min: f64,
    pub ph_drift_per_min: f64,
    /// Added to every temperature reading (uncalibrated probe).
    pub temperature_offset_c: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            temperature_c: 24.0,
            ambient_c: 22.0,
            ph: 7.8,
            ph_equilibrium: 8.2,
            heater_c_per_min: 0.5,
            chiller_c_per_min: 0.5,
            ambient_loss_per_min: 0.01,
            dose_ph_per_min: 0.3,
            ph_drift_per_min: 0.01,
            temperature_offset_c: 0.0,
        }
    }
}

/// Injected probe failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFault {
    Disconnected,
    Timeout,
    /// Probe answers with a non-finite value.
    Garbage,
}

struct TankModel {
    settings: SimSettings,
    temperature_c: f64,
    ph: f64,
    heater: bool,
    chiller: bool,
    dose: bool,
    thermal_overlap_seen: bool,
    compensation_c: Option<f64>,
    faults: HashMap<ProbeKind, ProbeFault>,
    drive_log: Vec<(Channel, bool)>,
    clock: Box<dyn Clock>,
    last: Instant,
}

impl TankModel {
    fn advance(&mut self) {
        let now = self.clock.now();
        let dt_min = now.saturating_duration_since(self.last).as_secs_f64() / 60.0;
        self.last = now;
        if dt_min <= 0.0 {
            return;
        }
        let s = self.settings;
        let mut dtemp = (s.ambient_c - self.temperature_c) * s.ambient_loss_per_min * dt_min;
        if self.heater {
            dtemp += s.heater_c_per_min * dt_min;
        }
        if self.chiller {
            dtemp -= s.chiller_c_per_min * dt_min;
        }
        self.temperature_c += dtemp;

        let mut dph = (s.ph_equilibrium - self.ph) * s.ph_drift_per_min * dt_min;
        if self.dose {
            dph -= s.dose_ph_per_min * dt_min;
        }
        self.ph = (self.ph + dph).clamp(0.0, 14.0);
    }
}

/// Handle on the shared tank model for tests and the CLI.
#[derive(Clone)]
pub struct SimulatedTank {
    inner: Rc<RefCell<TankModel>>,
}

impl SimulatedTank {
    pub fn new(clock: impl Clock + 'static, settings: SimSettings) -> Self {
        let last = clock.now();
        Self {
            inner: Rc::new(RefCell::new(TankModel {
                settings,
                temperature_c: settings.temperature_c,
                ph: settings.ph,
                heater: false,
                chiller: false,
                dose: false,
                thermal_overlap_seen: false,
                compensation_c: None,
                faults: HashMap::new(),
                drive_log: Vec::new(),
                clock: Box::new(clock),
                last,
            })),
        }
    }

    pub fn probes(&self) -> SimulatedProbes {
        SimulatedProbes {
            tank: self.inner.clone(),
        }
    }

    pub fn relays(&self) -> SimulatedRelays {
        SimulatedRelays {
            tank: self.inner.clone(),
        }
    }

    /// Inject or clear a fault on one probe.
    pub fn set_fault(&self, probe: ProbeKind, fault: Option<ProbeFault>) {
        let mut m = self.inner.borrow_mut();
        match fault {
            Some(f) => {
                m.faults.insert(probe, f);
            }
            None => {
                m.faults.remove(&probe);
            }
        }
    }

    pub fn temperature_c(&self) -> f64 {
        let mut m = self.inner.borrow_mut();
        m.advance();
        m.temperature_c
    }

    pub fn ph(&self) -> f64 {
        let mut m = self.inner.borrow_mut();
        m.advance();
        m.ph
    }

    /// Put the probes in a bath of known value (calibration).
    pub fn set_ph(&self, ph: f64) {
        let mut m = self.inner.borrow_mut();
        m.advance();
        m.ph = ph;
    }

    pub fn set_temperature_c(&self, celsius: f64) {
        let mut m = self.inner.borrow_mut();
        m.advance();
        m.temperature_c = celsius;
    }

    pub fn is_on(&self, channel: Channel) -> bool {
        let m = self.inner.borrow();
        match channel {
            Channel::Heater => m.heater,
            Channel::Chiller => m.chiller,
            Channel::Dose => m.dose,
        }
    }

    /// True once heater and chiller have ever been on together.
    pub fn thermal_overlap_seen(&self) -> bool {
        self.inner.borrow().thermal_overlap_seen
    }

    /// Last temperature forwarded to the pH probe.
    pub fn compensation_c(&self) -> Option<f64> {
        self.inner.borrow().compensation_c
    }

    /// Every relay write in order.
    pub fn drive_log(&self) -> Vec<(Channel, bool)> {
        self.inner.borrow().drive_log.clone()
    }
}

pub struct SimulatedProbes {
    tank: Rc<RefCell<TankModel>>,
}

impl ProbeReader for SimulatedProbes {
    fn read(&mut self, probe: ProbeKind, _timeout: Duration) -> Result<f64, BoxError> {
        let mut m = self.tank.borrow_mut();
        m.advance();
        match m.faults.get(&probe) {
            Some(ProbeFault::Disconnected) => return Err(Box::new(HwError::Disconnected)),
            Some(ProbeFault::Timeout) => return Err(Box::new(HwError::Timeout)),
            Some(ProbeFault::Garbage) => return Ok(f64::NAN),
            None => {}
        }
        let raw = match probe {
            ProbeKind::Temperature => m.temperature_c + m.settings.temperature_offset_c,
            ProbeKind::Ph => ph_to_raw(m.ph),
        };
        tracing::trace!(probe = probe.as_str(), raw, "sim probe");
        Ok(raw)
    }

    fn set_temperature_compensation(&mut self, celsius: f64) {
        self.tank.borrow_mut().compensation_c = Some(celsius);
    }
}

pub struct SimulatedRelays {
    tank: Rc<RefCell<TankModel>>,
}

impl Actuator for SimulatedRelays {
    fn set_drive(&mut self, channel: Channel, on: bool) -> Result<(), BoxError> {
        let mut m = self.tank.borrow_mut();
        m.advance();
        match channel {
            Channel::Heater => m.heater = on,
            Channel::Chiller => m.chiller = on,
            Channel::Dose => m.dose = on,
        }
        m.drive_log.push((channel, on));
        if m.heater && m.chiller {
            m.thermal_overlap_seen = true;
            tracing::error!("heater and chiller both on");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tank_traits::clock::test_clock::TestClock;

    #[test]
    fn heater_warms_the_tank() {
        let clock = TestClock::new();
        let tank = SimulatedTank::new(clock.clone(), SimSettings::default());
        let before = tank.temperature_c();
        tank.relays().set_drive(Channel::Heater, true).unwrap();
        clock.advance(Duration::from_secs(600));
        assert!(tank.temperature_c() > before + 4.0);
    }

    #[test]
    fn ph_raw_matches_buffer_points() {
        assert!((ph_to_raw(4.0) - 3000.0).abs() < 1e-9);
        assert!((ph_to_raw(7.0) - 2000.0).abs() < 1e-9);
        assert!((ph_to_raw(10.0) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn injected_fault_surfaces_as_error() {
        let tank = SimulatedTank::new(TestClock::new(), SimSettings::default());
        tank.set_fault(ProbeKind::Ph, Some(ProbeFault::Timeout));
        let err = tank
            .probes()
            .read(ProbeKind::Ph, Duration::from_millis(10))
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }
}
