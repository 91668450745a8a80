use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("probe read timeout")]
    Timeout,
    #[error("probe disconnected")]
    Disconnected,
    #[error("probe returned garbage")]
    Garbage,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
