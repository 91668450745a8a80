//! Collaborator contracts for the tank controller.
//!
//! The control engine in `tank_core` only ever talks to hardware, storage and
//! the front panel through these traits. Errors crossing the boundary are
//! boxed so implementations stay free to use their own error types.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::fmt;
use std::time::Duration;

/// Error type returned by collaborator implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which probe a reading or calibration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Ph,
    Temperature,
}

impl ProbeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeKind::Ph => "ph",
            ProbeKind::Temperature => "temperature",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical output channels driven by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Heater,
    Chiller,
    /// pH dosing solenoid (CO2 or reagent pump).
    Dose,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Heater => "heater",
            Channel::Chiller => "chiller",
            Channel::Dose => "dose",
        }
    }
}

/// Keypad events after debounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Up,
    Down,
    Select,
    Back,
    /// Digit key 0..=9.
    Digit(u8),
    DecimalPoint,
    Clear,
}

/// Snapshot handed to the remote logger.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TankReading {
    pub temperature_c: Option<f64>,
    pub temperature_setpoint_c: f64,
    pub ph: Option<f64>,
    pub ph_setpoint: f64,
    /// Milliseconds the heater was on since the previous log record.
    pub heater_on_ms: u64,
    /// Milliseconds the dose channel was on since the previous log record.
    pub dose_on_ms: u64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

pub trait ProbeReader {
    /// Read the current raw value of `probe`, giving up after `timeout`.
    fn read(&mut self, probe: ProbeKind, timeout: Duration) -> Result<f64, BoxError>;

    /// Forward the tank temperature to probes that compensate for it.
    fn set_temperature_compensation(&mut self, _celsius: f64) {}
}

pub trait Actuator {
    /// Idempotent; repeating the current command is allowed.
    fn set_drive(&mut self, channel: Channel, on: bool) -> Result<(), BoxError>;
}

/// String-level persistent record storage. Each `save` must be all-or-nothing.
pub trait RecordStore {
    fn load(&self, key: &str) -> Result<Option<String>, BoxError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), BoxError>;
}

pub trait Display {
    /// Render text; lines are separated by `\n`.
    fn render(&mut self, text: &str);
}

pub trait KeypadSource {
    fn poll(&mut self) -> Option<KeyEvent>;
}

pub trait RemoteLogger {
    /// Best effort; implementations swallow their own failures.
    fn record(&mut self, tank_id: u16, reading: &TankReading, timestamp_ms: u64);
}

impl<T: ProbeReader + ?Sized> ProbeReader for Box<T> {
    fn read(&mut self, probe: ProbeKind, timeout: Duration) -> Result<f64, BoxError> {
        (**self).read(probe, timeout)
    }

    fn set_temperature_compensation(&mut self, celsius: f64) {
        (**self).set_temperature_compensation(celsius);
    }
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn set_drive(&mut self, channel: Channel, on: bool) -> Result<(), BoxError> {
        (**self).set_drive(channel, on)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    fn load(&self, key: &str) -> Result<Option<String>, BoxError> {
        (**self).load(key)
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), BoxError> {
        (**self).save(key, value)
    }
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn render(&mut self, text: &str) {
        (**self).render(text);
    }
}

impl<T: KeypadSource + ?Sized> KeypadSource for Box<T> {
    fn poll(&mut self) -> Option<KeyEvent> {
        (**self).poll()
    }
}

impl<T: RemoteLogger + ?Sized> RemoteLogger for Box<T> {
    fn record(&mut self, tank_id: u16, reading: &TankReading, timestamp_ms: u64) {
        (**self).record(tank_id, reading, timestamp_ms);
    }
}
