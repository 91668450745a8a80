//! Do-nothing collaborators for headless runs and tests.

use tank_traits::{Display, KeyEvent, KeypadSource, RemoteLogger, TankReading};

/// Keypad that never has a key.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKeypad;

impl KeypadSource for NullKeypad {
    fn poll(&mut self) -> Option<KeyEvent> {
        None
    }
}

/// Display that drops every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn render(&mut self, _text: &str) {}
}

/// Remote logger that discards records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl RemoteLogger for NoopLogger {
    fn record(&mut self, _tank_id: u16, _reading: &TankReading, _timestamp_ms: u64) {}
}
