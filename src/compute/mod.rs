//! Compute layer for distance math and input validation.
//!
//! Independent of the index and cache: pure functions over coordinates.

pub mod distance;
pub mod validation;

pub use distance::{EARTH_RADIUS_KM, haversine_km};
pub use validation::{validate_coordinate, validate_k, validate_optional_coordinate};
