use thiserror::Error;

/// Invalid input to a coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside the supported band (80°S to 84°N)")]
    OutsideBand(f64),
    #[error("malformed reference {input:?}: {reason}")]
    Malformed { input: String, reason: &'static str },
    #[error("coordinate out of range: {0}")]
    OutOfRange(String),
}

impl CoordinateError {
    pub(crate) fn malformed(input: &str, reason: &'static str) -> Self {
        CoordinateError::Malformed {
            input: input.to_string(),
            reason,
        }
    }
}

/// A sampler could not produce elevations (failure or timeout).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("elevation unavailable: {0}")]
pub struct ElevationUnavailable(pub String);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VisibilityError {
    #[error(transparent)]
    ElevationUnavailable(#[from] ElevationUnavailable),
    #[error("computation cancelled")]
    Cancelled,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl VisibilityError {
    pub fn code(&self) -> &'static str {
        match self {
            VisibilityError::ElevationUnavailable(_) => "ELEVATION_UNAVAILABLE",
            VisibilityError::Cancelled => "CANCELLED",
            VisibilityError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}
