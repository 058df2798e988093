//! Cache builder for startup population
//!
//! Collects configuration and the entity sources to seed the cache with, then
//! loads them in one pass so the initial tree is balanced.

use crate::cache::IndexedEntityCache;
use crate::config::Config;
use crate::error::Result;
use crate::source::EntitySource;
use crate::types::{IndexedEntity, LoadReport};
use std::fmt;

/// Builder for an [`IndexedEntityCache`] seeded from one or more sources.
///
/// ```rust
/// use locus::{CacheBuilder, Config, IndexedEntity};
///
/// let cache = CacheBuilder::new()
///     .config(Config::default().with_max_results(20))
///     .entity(IndexedEntity::new(1, "Lakeside").with_coordinates(28.2096, 83.9596))
///     .build()?;
///
/// assert_eq!(cache.len(), 1);
/// # Ok::<(), locus::LocusError>(())
/// ```
pub struct CacheBuilder {
    config: Config,
    entities: Vec<IndexedEntity>,
    sources: Vec<Box<dyn EntitySource>>,
}

impl CacheBuilder {
    /// Create a new builder with default configuration and no entities.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            entities: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn entity(mut self, entity: IndexedEntity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn entities<T: IntoIterator<Item = IndexedEntity>>(mut self, entities: T) -> Self {
        self.entities.extend(entities);
        self
    }

    /// Add a source read when the cache is built. Sources load in the order added,
    /// after any entities given directly; later records win on duplicate ids.
    pub fn source<S: EntitySource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Build the cache and load every configured record.
    pub fn build(self) -> Result<IndexedEntityCache> {
        self.build_with_report().map(|(cache, _)| cache)
    }

    /// Build the cache, also returning the combined load outcome.
    pub fn build_with_report(self) -> Result<(IndexedEntityCache, LoadReport)> {
        let cache = IndexedEntityCache::with_config(self.config)?;

        let mut records = self.entities;
        for source in &self.sources {
            records.extend(source.fetch_entities()?);
        }

        let report = if records.is_empty() {
            LoadReport::default()
        } else {
            cache.load(&records)?
        };
        Ok((cache, report))
    }
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .field("sources", &self.sources.len())
            .finish()
    }
}
