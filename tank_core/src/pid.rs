//! Discrete PID controller with integral anti-windup.
//!
//! Time comes in as millisecond [`Timestamp`]s supplied by the caller, so the
//! controller has no clock of its own and is fully deterministic under test.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Smallest step used for `dt` (seconds). Covers the first tick and clock
/// anomalies where two ticks land on the same millisecond.
pub const MIN_DT_S: f64 = 0.001;

/// Proportional, integral and derivative gains. Persisted per control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    pub fn is_finite(&self) -> bool {
        self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    integral: f64,
    previous_error: f64,
    previous_tick: Option<Timestamp>,
    // false until the first tick after construction or a gain change
    seeded: bool,
    output_min: f64,
    output_max: f64,
}

impl PidController {
    /// Create a controller clamping its output to `[output_min, output_max]`.
    /// Limits given in the wrong order are swapped.
    pub fn new(gains: PidGains, output_min: f64, output_max: f64) -> Self {
        let (output_min, output_max) = ordered(output_min, output_max);
        Self {
            gains,
            integral: 0.0,
            previous_error: 0.0,
            previous_tick: None,
            seeded: false,
            output_min,
            output_max,
        }
    }

    /// Run one control step and return the clamped output.
    pub fn tick(&mut self, current: f64, setpoint: f64, now: Timestamp) -> f64 {
        let dt = match self.previous_tick {
            Some(prev) => (now.saturating_sub(prev) as f64 / 1000.0).max(MIN_DT_S),
            None => MIN_DT_S,
        };
        let error = setpoint - current;
        if !self.seeded {
            self.previous_error = error;
            self.seeded = true;
        }

        self.integral = self.clamp_integral(self.integral + error * dt);
        let derivative = (error - self.previous_error) / dt;
        let raw = self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;

        self.previous_error = error;
        self.previous_tick = Some(now);

        if raw.is_nan() {
            0.0_f64.clamp(self.output_min, self.output_max)
        } else {
            raw.clamp(self.output_min, self.output_max)
        }
    }

    /// Keep `ki * integral` inside the output limits.
    fn clamp_integral(&self, integral: f64) -> f64 {
        if self.gains.ki.abs() < f64::EPSILON || !integral.is_finite() {
            return 0.0;
        }
        let (lo, hi) = ordered(
            self.output_min / self.gains.ki,
            self.output_max / self.gains.ki,
        );
        integral.clamp(lo, hi)
    }

    /// Replace the gains. Clears the integral and re-seeds the derivative so the
    /// output does not jump.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
        self.integral = 0.0;
        self.seeded = false;
    }

    pub fn set_output_limits(&mut self, output_min: f64, output_max: f64) {
        let (lo, hi) = ordered(output_min, output_max);
        self.output_min = lo;
        self.output_max = hi;
        self.integral = self.clamp_integral(self.integral);
    }

    /// Forget all error history.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
        self.previous_tick = None;
        self.seeded = false;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn previous_error(&self) -> f64 {
        self.previous_error
    }

    pub fn previous_tick(&self) -> Option<Timestamp> {
        self.previous_tick
    }

    pub fn output_limits(&self) -> (f64, f64) {
        (self.output_min, self.output_max)
    }
}

#[inline]
fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_no_derivative_kick() {
        let mut pid = PidController::new(PidGains::new(0.0, 0.0, 10.0), -100.0, 100.0);
        // error of 5 on the very first call would be a huge spike with dt = MIN_DT
        let out = pid.tick(20.0, 25.0, 0);
        assert_eq!(out, 0.0);
        assert_eq!(pid.previous_error(), 5.0);
    }

    #[test]
    fn gain_change_reseeds_derivative() {
        let mut pid = PidController::new(PidGains::new(0.0, 0.0, 1.0), -100.0, 100.0);
        pid.tick(20.0, 25.0, 0);
        pid.tick(20.0, 25.0, 1_000);
        pid.set_gains(PidGains::new(0.0, 0.0, 2.0));
        // error jumps from 5 to 1 but the derivative is re-seeded
        let out = pid.tick(24.0, 25.0, 2_000);
        assert_eq!(out, 0.0);
    }

    #[test]
    fn swapped_limits_are_reordered() {
        let pid = PidController::new(PidGains::new(1.0, 0.0, 0.0), 5.0, -5.0);
        assert_eq!(pid.output_limits(), (-5.0, 5.0));
    }

    #[test]
    fn zero_ki_keeps_integral_empty() {
        let mut pid = PidController::new(PidGains::new(1.0, 0.0, 0.0), -10.0, 10.0);
        for t in 0..10 {
            pid.tick(0.0, 3.0, t * 1_000);
        }
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn nan_input_yields_neutral_output() {
        let mut pid = PidController::new(PidGains::new(1.0, 1.0, 0.0), -10.0, 10.0);
        let out = pid.tick(f64::NAN, 3.0, 0);
        assert_eq!(out, 0.0);
        assert_eq!(pid.integral(), 0.0);
    }
}
