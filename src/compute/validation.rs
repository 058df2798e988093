//! Validation for geographic coordinates and query parameters.

use crate::error::{LocusError, Result};

/// Upper bound on neighbors per query unless configured otherwise.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Validates a latitude/longitude pair.
///
/// Latitude: [-90.0, 90.0], Longitude: [-180.0, 180.0]
///
/// # Examples
///
/// ```
/// use locus::compute::validation::validate_coordinate;
///
/// // Valid point
/// assert!(validate_coordinate(27.7000, 83.4500).is_ok());
///
/// // Invalid latitude
/// assert!(validate_coordinate(95.0, 83.45).is_err());
///
/// // Non-finite longitude
/// assert!(validate_coordinate(27.7, f64::NAN).is_err());
/// ```
pub fn validate_coordinate(latitude: f64, longitude: f64) -> Result<()> {
    check_latitude(latitude, longitude)?;
    check_longitude(latitude, longitude)
}

/// Validates whichever half of a coordinate pair is present.
///
/// A record carrying only one value is never indexed, but that value must
/// still be finite and in range. The missing half is reported as NaN.
///
/// ```
/// use locus::compute::validation::validate_optional_coordinate;
///
/// assert!(validate_optional_coordinate(None, None).is_ok());
/// assert!(validate_optional_coordinate(Some(27.7), None).is_ok());
/// assert!(validate_optional_coordinate(Some(f64::NAN), None).is_err());
/// assert!(validate_optional_coordinate(None, Some(200.0)).is_err());
/// ```
pub fn validate_optional_coordinate(latitude: Option<f64>, longitude: Option<f64>) -> Result<()> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => validate_coordinate(latitude, longitude),
        (Some(latitude), None) => check_latitude(latitude, f64::NAN),
        (None, Some(longitude)) => check_longitude(f64::NAN, longitude),
        (None, None) => Ok(()),
    }
}

fn check_latitude(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() {
        return Err(LocusError::invalid_coordinate(
            latitude,
            longitude,
            "latitude must be finite",
        ));
    }

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(LocusError::invalid_coordinate(
            latitude,
            longitude,
            "latitude out of range [-90.0, 90.0]",
        ));
    }

    Ok(())
}

fn check_longitude(latitude: f64, longitude: f64) -> Result<()> {
    if !longitude.is_finite() {
        return Err(LocusError::invalid_coordinate(
            latitude,
            longitude,
            "longitude must be finite",
        ));
    }

    if !(-180.0..=180.0).contains(&longitude) {
        return Err(LocusError::invalid_coordinate(
            latitude,
            longitude,
            "longitude out of range [-180.0, 180.0]",
        ));
    }

    Ok(())
}

/// Validates the neighbor count of a query against `1..=max`.
///
/// ```
/// use locus::compute::validation::validate_k;
///
/// assert!(validate_k(5, 100).is_ok());
/// assert!(validate_k(0, 100).is_err());
/// assert!(validate_k(101, 100).is_err());
/// ```
pub fn validate_k(k: usize, max: usize) -> Result<()> {
    if k == 0 || k > max {
        return Err(LocusError::InvalidK { k, max });
    }
    Ok(())
}
