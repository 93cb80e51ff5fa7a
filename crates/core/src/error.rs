use thiserror::Error;

/// Errors from core type construction and parsing.
///
/// These are all configuration-class failures: they happen before any
/// network call and indicate malformed caller input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
