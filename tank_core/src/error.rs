use thiserror::Error;

/// Probe read failures. Recovered by the control loop's fail-safe.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReadError {
    #[error("probe unavailable: {0}")]
    Unavailable(String),
    #[error("timeout waiting for probe")]
    Timeout,
    #[error("probe returned a non-finite value")]
    NonFinite,
}

/// Persistent store failures. The attempted change is treated as not applied.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("cannot encode record {key}: {reason}")]
    Encode { key: &'static str, reason: String },
    #[error("cannot write record {key}: {reason}")]
    Write { key: &'static str, reason: String },
}

/// Numeric entry rejections. The entry stays active with its buffer intact.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("not a number")]
    Malformed,
    #[error("out of range {min}..{max}")]
    OutOfRange { min: f64, max: f64 },
    #[error("not saved: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Calibration(#[from] CalibrationError),
}

/// Calibration wizard failures. Persisted models are never touched by these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("calibration points too close together")]
    Degenerate,
    #[error("calibration point out of order")]
    OutOfOrder,
    #[error("calibration needs at least {needed} points, got {got}")]
    InsufficientPoints { needed: usize, got: usize },
    #[error("no calibration session in progress")]
    NoSession,
    #[error("a calibration session is already in progress")]
    SessionActive,
    #[error("calibration step not valid in the current session state")]
    NotReady,
    #[error("no fresh probe reading to capture")]
    NoReading,
    #[error("calibration not saved: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("missing collaborator: {0}")]
    Missing(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
