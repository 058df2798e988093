//! Error types for the nearest-location index.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LocusError>;

#[derive(Debug, Error)]
pub enum LocusError {
    /// A latitude/longitude pair that is non-finite or outside the geographic range.
    #[error("invalid coordinate ({latitude}, {longitude}): {reason}")]
    InvalidCoordinate {
        latitude: f64,
        longitude: f64,
        reason: String,
    },

    /// Neighbor count outside `1..=max`.
    #[error("k must be between 1 and {max}, got {k}")]
    InvalidK { k: usize, max: usize },

    #[error("entity {0} not found")]
    EntityNotFound(u64),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LocusError {
    pub(crate) fn invalid_coordinate(
        latitude: f64,
        longitude: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidCoordinate {
            latitude,
            longitude,
            reason: reason.into(),
        }
    }
}
