//! Thread-safe entity cache coordinating the attribute map with the spatial index.
//!
//! A single `RwLock` guards the map and the tree together, so a reader never
//! observes one updated without the other. Writes (`upsert`, `remove`,
//! `rebuild`, `load`) take the exclusive lock; queries and lookups share it.
//!
//! The tree never loses nodes on its own. Removing an entity or moving it to
//! new coordinates leaves its old node in place; queries skip any node whose id
//! is missing from the map or whose position no longer matches the entity.
//! [`IndexedEntityCache::rebuild`] drops those stale nodes.
//!
//! ```rust
//! use locus::{IndexedEntity, IndexedEntityCache};
//!
//! let cache = IndexedEntityCache::new();
//! cache.upsert(IndexedEntity::new(1, "Lakeside").with_coordinates(27.7000, 83.4500))?;
//! cache.upsert(IndexedEntity::new(2, "Hilltop").with_coordinates(27.7010, 83.4510))?;
//!
//! let nearest = cache.find_nearest(27.7000, 83.4500, 2)?;
//! assert_eq!(nearest[0].id, 1);
//! # Ok::<(), locus::LocusError>(())
//! ```

use crate::compute::validation::{validate_coordinate, validate_k};
use crate::config::Config;
use crate::error::{LocusError, Result};
use crate::kdtree::{Neighbor, SpatialIndex, SpatialNode};
use crate::source::EntitySource;
use crate::types::{CacheStats, EntityId, IndexedEntity, LoadReport, NearbyEntity, NearestResult};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Map and tree, always locked together.
#[derive(Debug, Default)]
struct CacheState {
    entities: FxHashMap<EntityId, IndexedEntity>,
    index: SpatialIndex<EntityId>,
    geocoded: usize,
}

impl CacheState {
    fn stale_nodes(&self) -> usize {
        self.index.len().saturating_sub(self.geocoded)
    }

    /// A node is live when its entity still exists at exactly the node's position.
    fn is_live(&self, node: &SpatialNode<EntityId>) -> bool {
        self.entities
            .get(node.id())
            .and_then(IndexedEntity::coordinate)
            .is_some_and(|c| c.latitude == node.latitude() && c.longitude == node.longitude())
    }

    /// Replace the tree with a balanced one built from the map. Returns dropped nodes.
    fn rebuild(&mut self) -> Result<usize> {
        let points: Vec<(EntityId, f64, f64)> = self
            .entities
            .values()
            .filter_map(|e| e.coordinate().map(|c| (e.id, c.latitude, c.longitude)))
            .collect();

        let before = self.index.len();
        self.index = SpatialIndex::bulk_load(points)?;
        self.geocoded = self.index.len();
        Ok(before.saturating_sub(self.index.len()))
    }
}

#[derive(Debug, Default)]
struct Counters {
    upserts: AtomicU64,
    removals: AtomicU64,
    queries: AtomicU64,
    rebuilds: AtomicU64,
}

#[derive(Debug)]
struct Shared {
    state: RwLock<CacheState>,
    config: Config,
    counters: Counters,
}

/// Concurrent attribute cache plus nearest-neighbor index.
///
/// Cloning is cheap and yields a handle to the same cache, so one instance can
/// be handed to every reader and writer.
///
/// # Thread Safety
///
/// - `find_nearest*`, `get`, `stats` run concurrently with each other
/// - `upsert`, `remove`, `rebuild`, `load` wait for readers to leave and run alone
/// - Guards are scoped, so the lock is released on every exit path
#[derive(Debug, Clone)]
pub struct IndexedEntityCache {
    shared: Arc<Shared>,
}

impl Default for IndexedEntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexedEntityCache {
    /// Creates an empty cache with default configuration.
    pub fn new() -> Self {
        Self::from_parts(Config::default())
    }

    /// Creates an empty cache with custom configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().map_err(LocusError::InvalidInput)?;
        Ok(Self::from_parts(config))
    }

    fn from_parts(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(CacheState::default()),
                config,
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    fn counters(&self) -> &Counters {
        &self.shared.counters
    }

    /// Inserts or replaces an entity.
    ///
    /// When the entity has both coordinates a node is added to the tree before
    /// the map entry is committed. A previous node for the same id is left in
    /// place and hidden from queries from then on.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` if any coordinate value the entity carries is
    /// invalid, even a lone latitude or longitude; the cache is unchanged in
    /// that case.
    pub fn upsert(&self, entity: IndexedEntity) -> Result<()> {
        entity.validate()?;
        let position = entity.coordinate();

        let mut state = self.shared.state.write();
        let previous = state
            .entities
            .get(&entity.id)
            .map(IndexedEntity::coordinate);

        if let Some(c) = position
            && previous.flatten() != Some(c)
        {
            state.index.insert(entity.id, c.latitude, c.longitude)?;
        }

        if let Some(Some(_)) = previous {
            state.geocoded -= 1;
        }
        if position.is_some() {
            state.geocoded += 1;
        }

        log::debug!(
            "upsert entity {} (replaced: {}) at {:?}",
            entity.id,
            previous.is_some(),
            position
        );
        state.entities.insert(entity.id, entity);
        self.counters().upserts.fetch_add(1, Ordering::Relaxed);

        self.maybe_rebuild(&mut state);
        Ok(())
    }

    /// Removes an entity from the attribute map.
    ///
    /// Its tree nodes stay behind until the next rebuild but never appear in
    /// query results.
    pub fn remove(&self, id: EntityId) -> Option<IndexedEntity> {
        let mut state = self.shared.state.write();
        let removed = state.entities.remove(&id)?;

        if removed.coordinate().is_some() {
            state.geocoded -= 1;
        }
        self.counters().removals.fetch_add(1, Ordering::Relaxed);
        log::debug!("removed entity {}", id);

        self.maybe_rebuild(&mut state);
        Some(removed)
    }

    /// Up to `k` nearest entities to the query, ascending by distance.
    ///
    /// Fewer than `k` results come back when fewer entities are indexed; an
    /// empty cache yields an empty list.
    ///
    /// # Errors
    ///
    /// `InvalidK` when `k` is zero or above the configured maximum,
    /// `InvalidCoordinate` for an invalid query point.
    pub fn find_nearest(
        &self,
        latitude: f64,
        longitude: f64,
        k: usize,
    ) -> Result<Vec<NearestResult>> {
        self.search(latitude, longitude, k, |entity, neighbor| NearestResult {
            id: entity.id,
            name: entity.name.clone(),
            latitude: neighbor.latitude,
            longitude: neighbor.longitude,
            distance_km: neighbor.distance_km,
        })
    }

    /// Same as [`find_nearest`](Self::find_nearest), returning whole entity records.
    pub fn find_nearest_entities(
        &self,
        latitude: f64,
        longitude: f64,
        k: usize,
    ) -> Result<Vec<NearbyEntity>> {
        self.search(latitude, longitude, k, |entity, neighbor| NearbyEntity {
            entity: entity.clone(),
            distance_km: neighbor.distance_km,
        })
    }

    /// Nearest entities to a `geo::Point` (x = longitude, y = latitude).
    pub fn find_nearest_to(&self, point: &geo::Point, k: usize) -> Result<Vec<NearestResult>> {
        self.find_nearest(point.y(), point.x(), k)
    }

    fn search<T>(
        &self,
        latitude: f64,
        longitude: f64,
        k: usize,
        hydrate: impl Fn(&IndexedEntity, &Neighbor<EntityId>) -> T,
    ) -> Result<Vec<T>> {
        validate_k(k, self.shared.config.max_results)?;
        validate_coordinate(latitude, longitude)?;

        let state = self.shared.state.read();
        let neighbors = state
            .index
            .nearest_filtered(latitude, longitude, k, |node| state.is_live(node));
        self.counters().queries.fetch_add(1, Ordering::Relaxed);

        log::trace!(
            "nearest ({}, {}) k={} -> {} results",
            latitude,
            longitude,
            k,
            neighbors.len()
        );

        Ok(neighbors
            .iter()
            .filter_map(|n| state.entities.get(&n.id).map(|e| hydrate(e, n)))
            .collect())
    }

    pub fn get(&self, id: EntityId) -> Option<IndexedEntity> {
        self.shared.state.read().entities.get(&id).cloned()
    }

    /// Like [`get`](Self::get), failing with `EntityNotFound` for unknown ids.
    pub fn entity(&self, id: EntityId) -> Result<IndexedEntity> {
        self.get(id).ok_or(LocusError::EntityNotFound(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.shared.state.read().entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.shared.state.read().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.read().entities.is_empty()
    }

    /// Rebuilds the tree from the live entities, dropping every stale node.
    ///
    /// Returns the number of nodes dropped.
    pub fn rebuild(&self) -> Result<usize> {
        let mut state = self.shared.state.write();
        let dropped = state.rebuild()?;
        self.counters().rebuilds.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "rebuilt spatial index: {} nodes, {} stale dropped",
            state.index.len(),
            dropped
        );
        Ok(dropped)
    }

    fn maybe_rebuild(&self, state: &mut CacheState) {
        if !self
            .shared
            .config
            .should_rebuild(state.stale_nodes(), state.index.len())
        {
            return;
        }

        match state.rebuild() {
            Ok(dropped) => {
                self.counters().rebuilds.fetch_add(1, Ordering::Relaxed);
                log::info!("automatic rebuild dropped {} stale nodes", dropped);
            }
            Err(e) => log::warn!("automatic rebuild failed: {}", e),
        }
    }

    /// Populates the cache from `source`.
    ///
    /// Records with invalid coordinates are logged and skipped. Accepted records
    /// replace existing entries with the same id, a later record replacing an
    /// earlier one from the same batch, and the tree is rebuilt balanced over
    /// the whole map. The report counts distinct stored records.
    ///
    /// # Errors
    ///
    /// Propagates failures of the source itself.
    pub fn load<S: EntitySource + ?Sized>(&self, source: &S) -> Result<LoadReport> {
        let records = source.fetch_entities()?;
        let mut skipped = 0;

        // Later records win on duplicate ids.
        let mut accepted: FxHashMap<EntityId, IndexedEntity> = FxHashMap::default();
        for entity in records {
            if let Err(e) = entity.validate() {
                log::warn!("skipping entity {} ({}): {}", entity.id, entity.name, e);
                skipped += 1;
                continue;
            }
            accepted.insert(entity.id, entity);
        }

        let geocoded = accepted
            .values()
            .filter(|e| e.coordinate().is_some())
            .count();
        let report = LoadReport {
            loaded: accepted.len(),
            geocoded,
            skipped,
        };

        let mut state = self.shared.state.write();
        state.entities.extend(accepted);
        state.rebuild()?;
        self.counters().rebuilds.fetch_add(1, Ordering::Relaxed);

        log::info!(
            "loaded {} entities ({} geocoded, {} skipped)",
            report.loaded,
            report.geocoded,
            report.skipped
        );
        Ok(report)
    }

    /// Snapshot of size and activity counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.read();
        let counters = &self.shared.counters;
        CacheStats {
            entities: state.entities.len(),
            geocoded_entities: state.geocoded,
            tree_nodes: state.index.len(),
            stale_nodes: state.stale_nodes(),
            tree_depth: state.index.depth(),
            upserts: counters.upserts.load(Ordering::Relaxed),
            removals: counters.removals.load(Ordering::Relaxed),
            queries: counters.queries.load(Ordering::Relaxed),
            rebuilds: counters.rebuilds.load(Ordering::Relaxed),
        }
    }

    /// Checks the tree's axis-ordering invariant.
    pub fn check_invariants(&self) -> bool {
        self.shared.state.read().index.check_invariants()
    }
}
