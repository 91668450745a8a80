//! Remote logger implementations.

use std::cell::RefCell;
use std::rc::Rc;

use tank_traits::{RemoteLogger, TankReading};

/// Emits each record as a structured `tracing` event on target `tank::remote`.
/// A JSON subscriber turns these into one line per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRemoteLogger;

impl RemoteLogger for TracingRemoteLogger {
    fn record(&mut self, tank_id: u16, reading: &TankReading, timestamp_ms: u64) {
        tracing::info!(
            target: "tank::remote",
            tank_id,
            timestamp_ms,
            temperature_c = ?reading.temperature_c,
            temperature_setpoint_c = reading.temperature_setpoint_c,
            ph = ?reading.ph,
            ph_setpoint = reading.ph_setpoint,
            heater_on_ms = reading.heater_on_ms,
            dose_on_ms = reading.dose_on_ms,
            kp = reading.kp,
            ki = reading.ki,
            kd = reading.kd,
            "tank record"
        );
    }
}

/// Keeps records in memory; clones share the list.
#[derive(Debug, Default, Clone)]
pub struct MemoryRemoteLogger {
    records: Rc<RefCell<Vec<(u16, TankReading, u64)>>>,
}

impl MemoryRemoteLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(u16, TankReading, u64)> {
        self.records.borrow().clone()
    }
}

impl RemoteLogger for MemoryRemoteLogger {
    fn record(&mut self, tank_id: u16, reading: &TankReading, timestamp_ms: u64) {
        self.records
            .borrow_mut()
            .push((tank_id, *reading, timestamp_ms));
    }
}
