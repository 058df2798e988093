//! Entity records and query results exchanged with callers.

use crate::compute::distance::haversine_km;
use crate::compute::validation::{validate_coordinate, validate_optional_coordinate};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of an indexed entity.
pub type EntityId = u64;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_coordinate(self.latitude, self.longitude)
    }

    /// Haversine distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

impl From<geo::Point> for Coordinate {
    fn from(point: geo::Point) -> Self {
        // geo points are (x = longitude, y = latitude)
        Self::new(point.y(), point.x())
    }
}

impl From<Coordinate> for geo::Point {
    fn from(coordinate: Coordinate) -> Self {
        geo::Point::new(coordinate.longitude, coordinate.latitude)
    }
}

/// Attribute record cached alongside the spatial index.
///
/// Entities without both coordinates are kept for lookups but never indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntity {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl IndexedEntity {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: String::new(),
            contact: String::new(),
            email: String::new(),
            image_url: String::new(),
            description: String::new(),
            capacity: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = contact.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Position of the entity, present only when both coordinates are set.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Checks every coordinate value the record carries, even a lone one.
    pub fn validate(&self) -> Result<()> {
        validate_optional_coordinate(self.latitude, self.longitude)
    }
}

/// One row of a nearest-neighbor answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestResult {
    pub id: EntityId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}

/// A nearest-neighbor answer carrying the full entity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyEntity {
    pub entity: IndexedEntity,
    pub distance_km: f64,
}

/// Point-in-time view of a cache's size and activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entities in the attribute map.
    pub entities: usize,
    /// Entities that have both coordinates.
    pub geocoded_entities: usize,
    pub tree_nodes: usize,
    /// Nodes no longer backing a live entity position.
    pub stale_nodes: usize,
    pub tree_depth: usize,
    pub upserts: u64,
    pub removals: u64,
    pub queries: u64,
    pub rebuilds: u64,
}

/// Outcome of populating a cache from an entity source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Records stored in the attribute map.
    pub loaded: usize,
    /// Stored records that were also indexed.
    pub geocoded: usize,
    /// Records rejected for invalid coordinates.
    pub skipped: usize,
}
