//! Typed persistent records on top of the string-level [`RecordStore`].
//!
//! Each record is a JSON document under a symbolic key. Layout below the key
//! (files, EEPROM pages, ...) belongs to the `RecordStore` implementation.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tank_traits::{ProbeKind, RecordStore};

use crate::error::StoreError;
use crate::hw_error::map_store_error;

/// Symbolic identifiers of every persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordId {
    PhCalibration,
    TempCalibration,
    PhSetpoint,
    TempSetpoint,
    PhPid,
    TempPid,
    PhDoseMode,
    TankId,
    LogInterval,
}

impl RecordId {
    pub const ALL: [RecordId; 9] = [
        RecordId::PhCalibration,
        RecordId::TempCalibration,
        RecordId::PhSetpoint,
        RecordId::TempSetpoint,
        RecordId::PhPid,
        RecordId::TempPid,
        RecordId::PhDoseMode,
        RecordId::TankId,
        RecordId::LogInterval,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            RecordId::PhCalibration => "ph.calibration",
            RecordId::TempCalibration => "temp.calibration",
            RecordId::PhSetpoint => "ph.setpoint",
            RecordId::TempSetpoint => "temp.setpoint",
            RecordId::PhPid => "ph.pid",
            RecordId::TempPid => "temp.pid",
            RecordId::PhDoseMode => "ph.dose_mode",
            RecordId::TankId => "device.tank_id",
            RecordId::LogInterval => "logging.interval_min",
        }
    }

    pub const fn calibration(probe: ProbeKind) -> Self {
        match probe {
            ProbeKind::Ph => RecordId::PhCalibration,
            ProbeKind::Temperature => RecordId::TempCalibration,
        }
    }

    pub const fn setpoint(probe: ProbeKind) -> Self {
        match probe {
            ProbeKind::Ph => RecordId::PhSetpoint,
            ProbeKind::Temperature => RecordId::TempSetpoint,
        }
    }

    pub const fn pid(probe: ProbeKind) -> Self {
        match probe {
            ProbeKind::Ph => RecordId::PhPid,
            ProbeKind::Temperature => RecordId::TempPid,
        }
    }
}

/// Typed get/put of records. Implemented for every [`RecordStore`].
pub trait PersistentStore {
    /// Missing, unreadable or undecodable records all read as `None`; the
    /// caller falls back to its configured default.
    fn get<T: DeserializeOwned>(&self, id: RecordId) -> Option<T>;

    /// All-or-nothing write of one record.
    fn put<T: Serialize>(&mut self, id: RecordId, value: &T) -> Result<(), StoreError>;
}

impl<R: RecordStore + ?Sized> PersistentStore for R {
    fn get<T: DeserializeOwned>(&self, id: RecordId) -> Option<T> {
        let raw = match self.load(id.key()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = id.key(), error = %e, "record load failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key = id.key(), error = %e, "record decode failed; ignoring");
                None
            }
        }
    }

    fn put<T: Serialize>(&mut self, id: RecordId, value: &T) -> Result<(), StoreError> {
        let key = id.key();
        let json = serde_json::to_string(value).map_err(|e| StoreError::Encode {
            key,
            reason: e.to_string(),
        })?;
        self.save(key, &json)
            .map_err(|e| map_store_error(key, e.as_ref()))?;
        tracing::debug!(key, "record saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tank_traits::BoxError;

    #[derive(Default)]
    struct MapStore(HashMap<String, String>);

    impl RecordStore for MapStore {
        fn load(&self, key: &str) -> Result<Option<String>, BoxError> {
            Ok(self.0.get(key).cloned())
        }
        fn save(&mut self, key: &str, value: &str) -> Result<(), BoxError> {
            self.0.insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<_> = RecordId::ALL.iter().map(|r| r.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), RecordId::ALL.len());
    }

    #[test]
    fn put_then_get() {
        let mut s = MapStore::default();
        s.put(RecordId::PhSetpoint, &7.25f64).unwrap();
        assert_eq!(s.get::<f64>(RecordId::PhSetpoint), Some(7.25));
        assert_eq!(s.get::<f64>(RecordId::TempSetpoint), None);
    }

    #[test]
    fn garbage_reads_as_missing() {
        let mut s = MapStore::default();
        s.save("ph.setpoint", "not json").unwrap();
        assert_eq!(s.get::<f64>(RecordId::PhSetpoint), None);
    }
}
