//! Concurrent in-memory nearest-location index over geo-tagged entities.
//!
//! A 2-d tree answers "k nearest to this point" queries under the haversine
//! metric, and an entity cache keeps the tree consistent with each entity's
//! attributes behind a single readers-writer lock.
//!
//! ```rust
//! use locus::{IndexedEntity, IndexedEntityCache};
//!
//! let cache = IndexedEntityCache::new();
//! cache.upsert(IndexedEntity::new(1, "Lakeside").with_coordinates(27.7000, 83.4500))?;
//! cache.upsert(IndexedEntity::new(2, "Hilltop").with_coordinates(27.7010, 83.4510))?;
//! cache.upsert(IndexedEntity::new(3, "Riverside").with_coordinates(27.6990, 83.4490))?;
//!
//! let nearest = cache.find_nearest(27.7000, 83.4500, 2)?;
//! assert_eq!(nearest[0].id, 1);
//!
//! cache.remove(2);
//! let nearest = cache.find_nearest(27.7000, 83.4500, 3)?;
//! assert!(nearest.iter().all(|r| r.id != 2));
//! # Ok::<(), locus::LocusError>(())
//! ```

pub mod builder;
pub mod cache;
pub mod compute;
pub mod config;
pub mod error;
pub mod kdtree;
pub mod source;
pub mod types;

pub use builder::CacheBuilder;
pub use cache::IndexedEntityCache;
pub use config::Config;
pub use error::{LocusError, Result};

pub use compute::{EARTH_RADIUS_KM, haversine_km};

pub use kdtree::{Axis, Neighbor, SpatialIndex, SpatialNode};

pub use source::{EntitySource, JsonEntitySource};

pub use types::{
    CacheStats, Coordinate, EntityId, IndexedEntity, LoadReport, NearbyEntity, NearestResult,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{CacheBuilder, Config, IndexedEntityCache, LocusError, Result};

    pub use crate::{Coordinate, EntityId, IndexedEntity, NearbyEntity, NearestResult};

    pub use crate::{EntitySource, JsonEntitySource};

    pub use crate::SpatialIndex;
}
