//! Human-readable error descriptions and structured JSON error formatting.

use tank_core::error::{BuildError, CalibrationError, ReadError, StoreError, ValidationError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::Missing(what) => format!(
                "What happened: The controller was built without a {what}.\nLikely causes: A collaborator failed to initialize.\nHow to fix: Re-run with --log-level=debug and check the startup messages."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CalibrationError>() {
        return match ce {
            CalibrationError::Degenerate => "What happened: Calibration points are too close together to fit a line.\nLikely causes: The probe read the same value in every buffer, or the CSV repeats a raw value.\nHow to fix: Use reference solutions that are further apart and check the probe is wet and connected.".to_string(),
            CalibrationError::InsufficientPoints { needed, got } => format!(
                "What happened: Calibration needs at least {needed} points, got {got}.\nHow to fix: Add rows to the calibration CSV."
            ),
            CalibrationError::Store(se) => format!(
                "What happened: Calibration could not be saved ({se}).\nLikely causes: store.dir is not writable.\nHow to fix: Check permissions and free space; the old calibration is still in force."
            ),
            other => format!("What happened: Calibration failed: {other}.\nHow to fix: Restart the calibration."),
        };
    }

    if let Some(se) = err.downcast_ref::<StoreError>() {
        return format!(
            "What happened: A setting could not be saved ({se}).\nLikely causes: store.dir is missing or not writable.\nHow to fix: Check the [store] section and the directory permissions."
        );
    }

    if let Some(re) = err.downcast_ref::<ReadError>() {
        return match re {
            ReadError::Timeout => format!(
                "What happened: Probe read timed out ({err}).\nLikely causes: Probe not connected, or the timeout is too low.\nHow to fix: Check the probe wiring and consider raising hardware.sensor_read_timeout_ms."
            ),
            ReadError::NonFinite => format!(
                "What happened: Probe returned an invalid value ({err}).\nLikely causes: Damaged probe or electrical noise.\nHow to fix: Reseat the probe; recalibrate if it persists."
            ),
            ReadError::Unavailable(_) => format!(
                "What happened: Probe unavailable ({err:#}).\nLikely causes: Probe disconnected or its interface failed to start.\nHow to fix: Check the probe cable and power."
            ),
        };
    }

    if let Some(ve) = err.downcast_ref::<ValidationError>() {
        return format!("What happened: Value rejected: {ve}.");
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("parse config") || lower.contains("read config") {
        return format!(
            "What happened: The config file could not be loaded.\nDetails: {msg}\nHow to fix: Check the path and the TOML syntax."
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid.\nDetails: {msg}\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'raw,reference'.".to_string();
    }

    if lower.contains("store.dir is not configured") {
        return "What happened: No record store is configured.\nHow to fix: Set [store] dir in the config.".to_string();
    }

    format!(
        "Something went wrong.\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes by error kind.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    if err.downcast_ref::<CalibrationError>().is_some() {
        return 3;
    }
    if err.downcast_ref::<StoreError>().is_some() {
        return 4;
    }
    if err.downcast_ref::<ReadError>().is_some() {
        return 5;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        "Build"
    } else if err.downcast_ref::<CalibrationError>().is_some() {
        "Calibration"
    } else if err.downcast_ref::<StoreError>().is_some() {
        "Store"
    } else if err.downcast_ref::<ReadError>().is_some() {
        "ProbeRead"
    } else {
        "Error"
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
