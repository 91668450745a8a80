//! Multi-point calibration session.
//!
//! ```text
//!  Idle ──begin──▶ AwaitingPoint(0) ──capture──▶ ... ──capture──▶ Confirming
//!                       │                                            │
//!                     abort                                        confirm
//!                       ▼                                      ┌─────┴─────┐
//!                    Aborted ◀──────── fit/store failure ──────┘       Committed
//! ```
//!
//! Nothing is written to the store before `confirm`, so an aborted or failed
//! session leaves the previous model in place.

use tank_traits::ProbeKind;

use crate::Timestamp;
use crate::calibration::{CalibrationModel, CalibrationPoint, check_order};
use crate::error::CalibrationError;
use crate::store::{PersistentStore, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Idle,
    /// Waiting for the point at this index.
    AwaitingPoint(usize),
    /// All points captured; waiting for `confirm` or `abort`.
    Confirming,
    Committed,
    Aborted,
}

/// Points captured per session: low/mid/high buffers for pH, low/high baths
/// for temperature.
pub const fn required_points(probe: ProbeKind) -> usize {
    match probe {
        ProbeKind::Ph => 3,
        ProbeKind::Temperature => 2,
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationWizard {
    state: WizardState,
    probe: Option<ProbeKind>,
    points: Vec<CalibrationPoint>,
    last_error: Option<CalibrationError>,
    committed: Option<CalibrationModel>,
}

impl Default for CalibrationWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationWizard {
    pub const fn new() -> Self {
        Self {
            state: WizardState::Idle,
            probe: None,
            points: Vec::new(),
            last_error: None,
            committed: None,
        }
    }

    pub fn begin_session(&mut self, probe: ProbeKind) -> Result<(), CalibrationError> {
        if self.is_active() {
            return Err(CalibrationError::SessionActive);
        }
        self.state = WizardState::AwaitingPoint(0);
        self.probe = Some(probe);
        self.points.clear();
        self.last_error = None;
        self.committed = None;
        tracing::info!(probe = probe.as_str(), "calibration session started");
        Ok(())
    }

    /// Record one point. A rejected point leaves the session where it was.
    pub fn capture_reading(
        &mut self,
        raw: f64,
        reference: f64,
    ) -> Result<WizardState, CalibrationError> {
        let probe = self.active_probe()?;
        let WizardState::AwaitingPoint(index) = self.state else {
            return Err(self.reject(CalibrationError::NotReady));
        };
        if !(raw.is_finite() && reference.is_finite()) {
            return Err(self.reject(CalibrationError::NoReading));
        }
        let point = CalibrationPoint::new(raw, reference);
        if let Err(e) = check_order(&self.points, point) {
            tracing::warn!(probe = probe.as_str(), index, raw, reference, "calibration point rejected");
            return Err(self.reject(e));
        }

        self.points.push(point);
        self.last_error = None;
        self.state = if self.points.len() >= required_points(probe) {
            WizardState::Confirming
        } else {
            WizardState::AwaitingPoint(self.points.len())
        };
        tracing::debug!(probe = probe.as_str(), index, raw, reference, "calibration point captured");
        Ok(self.state)
    }

    /// Fit and persist. Only a successful store write reaches `Committed`.
    pub fn confirm<S: PersistentStore + ?Sized>(
        &mut self,
        store: &mut S,
        now: Timestamp,
    ) -> Result<CalibrationModel, CalibrationError> {
        let probe = self.active_probe()?;
        if self.state != WizardState::Confirming {
            return Err(self.reject(CalibrationError::NotReady));
        }

        let result = CalibrationModel::from_points(&self.points, now).and_then(|model| {
            store
                .put(RecordId::calibration(probe), &model)
                .map_err(CalibrationError::from)?;
            Ok(model)
        });
        self.points.clear();
        match result {
            Ok(model) => {
                self.state = WizardState::Committed;
                self.committed = Some(model);
                self.last_error = None;
                tracing::info!(
                    probe = probe.as_str(),
                    slope = model.slope,
                    intercept = model.intercept,
                    "calibration committed"
                );
                Ok(model)
            }
            Err(e) => {
                self.state = WizardState::Aborted;
                self.last_error = Some(e.clone());
                tracing::warn!(probe = probe.as_str(), error = %e, "calibration aborted");
                Err(e)
            }
        }
    }

    /// Discard the session. Returns false when nothing was active.
    pub fn abort(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        if let Some(probe) = self.probe {
            tracing::info!(probe = probe.as_str(), "calibration session aborted");
        }
        self.state = WizardState::Aborted;
        self.points.clear();
        true
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            WizardState::AwaitingPoint(_) | WizardState::Confirming
        )
    }

    /// Probe of the running session, if any.
    pub fn active_session(&self) -> Option<ProbeKind> {
        if self.is_active() { self.probe } else { None }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn probe(&self) -> Option<ProbeKind> {
        self.probe
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    pub fn last_error(&self) -> Option<&CalibrationError> {
        self.last_error.as_ref()
    }

    pub fn committed_model(&self) -> Option<CalibrationModel> {
        self.committed
    }

    fn active_probe(&self) -> Result<ProbeKind, CalibrationError> {
        self.active_session().ok_or(CalibrationError::NoSession)
    }

    fn reject(&mut self, e: CalibrationError) -> CalibrationError {
        self.last_error = Some(e.clone());
        e
    }
}
