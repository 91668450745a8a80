//! Maps `Box<dyn Error>` from collaborator traits to typed core errors.
//!
//! The traits in `tank_traits` return `Box<dyn Error + Send + Sync>`; this
//! module converts those to `ReadError`/`StoreError`, with an optional
//! feature-gated path for `tank_hardware::HwError` downcasting.

use crate::error::{ReadError, StoreError};

/// Map a probe read failure to a typed `ReadError`.
///
/// Known hardware error types are downcast first, then string heuristics.
pub fn map_read_error(e: &(dyn std::error::Error + 'static)) -> ReadError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<tank_hardware::error::HwError>() {
            return match hw {
                tank_hardware::error::HwError::Timeout => ReadError::Timeout,
                tank_hardware::error::HwError::Garbage => ReadError::NonFinite,
                other => ReadError::Unavailable(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        ReadError::Timeout
    } else {
        ReadError::Unavailable(s)
    }
}

/// Map a record store failure for `key` to a `StoreError::Write`.
pub fn map_store_error(key: &'static str, e: &(dyn std::error::Error + 'static)) -> StoreError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(tank_hardware::error::HwError::Io(reason)) =
            e.downcast_ref::<tank_hardware::error::HwError>()
        {
            return StoreError::Write {
                key,
                reason: reason.to_string(),
            };
        }
    }

    StoreError::Write {
        key,
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_text_maps_to_timeout() {
        let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        assert_eq!(map_read_error(&e), ReadError::Timeout);
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_disconnect_maps_to_unavailable() {
        let e = tank_hardware::error::HwError::Disconnected;
        assert!(matches!(map_read_error(&e), ReadError::Unavailable(_)));
    }
}
