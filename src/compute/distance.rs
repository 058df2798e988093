//! Great-circle distances on a spherical Earth.
//!
//! All distances are in kilometres. The split-plane bounds are lower bounds on
//! the haversine distance from a query point to any point on the far side of a
//! k-d tree split, so they can be compared directly against kept distances.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Mean Earth radius used by the haversine metric.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// Shrinks bounds slightly so rounding never prunes a subtree holding a closer point.
const BOUND_SLACK: f64 = 1.0 - 1e-9;

/// Haversine distance in kilometres between two latitude/longitude pairs (degrees).
///
/// ```
/// use locus::compute::distance::haversine_km;
///
/// // New York to Los Angeles
/// let d = haversine_km(40.7128, -74.0060, 34.0522, -118.2437);
/// assert!(d > 3_900.0 && d < 4_000.0);
/// ```
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Lower bound on the distance from `query_lat` to any point whose latitude lies
/// on the other side of `split_lat`.
pub(crate) fn latitude_gap_km(query_lat: f64, split_lat: f64) -> f64 {
    EARTH_RADIUS_KM * (query_lat - split_lat).to_radians().abs() * BOUND_SLACK
}

/// Lower bound on the distance from the query to any point whose longitude lies
/// on the other side of `split_lon`.
///
/// A longitude half-range is bounded by the splitting meridian and the
/// antimeridian, so the nearer of the two is the bound.
pub(crate) fn longitude_gap_km(query_lat: f64, query_lon: f64, split_lon: f64) -> f64 {
    let phi = query_lat.to_radians();
    let to_split = meridian_arc(phi, (query_lon - split_lon).to_radians());
    let to_antimeridian = meridian_arc(phi, (query_lon - 180.0).to_radians());
    EARTH_RADIUS_KM * to_split.min(to_antimeridian) * BOUND_SLACK
}

/// Angular distance from latitude `phi` to the meridian half-circle that lies
/// `delta_lambda` away in longitude (poles included).
fn meridian_arc(phi: f64, delta_lambda: f64) -> f64 {
    let mut delta = delta_lambda.abs() % TAU;
    if delta > PI {
        delta = TAU - delta;
    }

    if delta <= FRAC_PI_2 {
        (phi.cos() * delta.sin()).clamp(-1.0, 1.0).asin()
    } else {
        // Nearest point of the half-circle is the closer pole.
        FRAC_PI_2 - phi.abs()
    }
}
