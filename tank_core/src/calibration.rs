//! Linear probe calibration: raw reading → reference value.
//!
//! `fit` is an ordinary least-squares line through the captured points; with
//! exactly two points it is the two-point line. The resulting
//! [`CalibrationModel`] is what gets persisted per probe.

use serde::{Deserialize, Serialize};

use crate::Timestamp;
use crate::error::CalibrationError;

/// Raw readings closer together than this cannot give a reliable slope.
pub const MIN_RAW_SEPARATION: f64 = 1e-3;

/// One captured (raw reading, reference value) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub raw: f64,
    pub reference: f64,
}

impl CalibrationPoint {
    pub const fn new(raw: f64, reference: f64) -> Self {
        Self { raw, reference }
    }
}

/// Slope/intercept of a fitted line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

/// Persisted calibration for one probe: `value = slope * raw + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    pub slope: f64,
    pub intercept: f64,
    /// Controller time of the successful fit; `None` for the identity model.
    pub computed_at: Option<Timestamp>,
}

impl Default for CalibrationModel {
    fn default() -> Self {
        Self::identity()
    }
}

impl CalibrationModel {
    pub const fn identity() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
            computed_at: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.computed_at.is_none() && self.slope == 1.0 && self.intercept == 0.0
    }

    /// Fit a model from points captured at `now`.
    pub fn from_points(
        points: &[CalibrationPoint],
        now: Timestamp,
    ) -> Result<Self, CalibrationError> {
        let LineFit { slope, intercept } = fit(points)?;
        Ok(Self {
            slope,
            intercept,
            computed_at: Some(now),
        })
    }

    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        self.slope * raw + self.intercept
    }

    /// Models loaded from storage must be usable as-is.
    pub fn is_valid(&self) -> bool {
        self.slope.is_finite() && self.intercept.is_finite() && self.slope != 0.0
    }
}

/// Least-squares line through `points` (raw on x, reference on y).
pub fn fit(points: &[CalibrationPoint]) -> Result<LineFit, CalibrationError> {
    if points.len() < 2 {
        return Err(CalibrationError::InsufficientPoints {
            needed: 2,
            got: points.len(),
        });
    }
    if points
        .iter()
        .any(|p| !(p.raw.is_finite() && p.reference.is_finite()))
    {
        return Err(CalibrationError::Degenerate);
    }

    let (lo, hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.raw), hi.max(p.raw))
        });
    if hi - lo < MIN_RAW_SEPARATION {
        return Err(CalibrationError::Degenerate);
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.raw).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.reference).sum::<f64>() / n;
    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    for p in points {
        let x = p.raw - mean_x;
        let y = p.reference - mean_y;
        sxx += x * x;
        sxy += x * y;
    }
    if !sxx.is_finite() || sxx == 0.0 {
        return Err(CalibrationError::Degenerate);
    }
    let slope = sxy / sxx;
    if !slope.is_finite() || slope == 0.0 {
        return Err(CalibrationError::Degenerate);
    }
    let intercept = mean_y - slope * mean_x;
    Ok(LineFit { slope, intercept })
}

/// Check that `next` keeps the session ordered: references strictly
/// increasing, raw readings strictly monotonic in the direction set by the
/// first two points.
pub fn check_order(
    previous: &[CalibrationPoint],
    next: CalibrationPoint,
) -> Result<(), CalibrationError> {
    let Some(last) = previous.last() else {
        return Ok(());
    };
    if next.reference <= last.reference {
        return Err(CalibrationError::OutOfOrder);
    }
    let step = next.raw - last.raw;
    if step == 0.0 {
        return Err(CalibrationError::OutOfOrder);
    }
    if let [first, second, ..] = previous {
        let dir = second.raw - first.raw;
        if dir.signum() != step.signum() {
            return Err(CalibrationError::OutOfOrder);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips_raw() {
        let m = CalibrationModel::identity();
        assert_eq!(m.apply(7.25), 7.25);
        assert!(m.is_identity());
    }

    #[test]
    fn two_points_give_the_two_point_line() {
        let f = fit(&[
            CalibrationPoint::new(100.0, 0.0),
            CalibrationPoint::new(200.0, 100.0),
        ])
        .unwrap();
        assert!((f.slope - 1.0).abs() < 1e-12);
        assert!((f.intercept + 100.0).abs() < 1e-9);
    }

    #[test]
    fn one_point_is_not_enough() {
        let err = fit(&[CalibrationPoint::new(1.0, 1.0)]).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::InsufficientPoints { needed: 2, got: 1 }
        );
    }

    #[test]
    fn order_check_follows_first_direction() {
        let pts = [
            CalibrationPoint::new(3000.0, 4.0),
            CalibrationPoint::new(2000.0, 7.0),
        ];
        assert!(check_order(&pts, CalibrationPoint::new(1000.0, 10.0)).is_ok());
        assert_eq!(
            check_order(&pts, CalibrationPoint::new(2500.0, 10.0)),
            Err(CalibrationError::OutOfOrder)
        );
    }
}
