//! Entity sources used to populate a cache.
//!
//! The persistence layer owning the entity records lives outside this crate;
//! anything able to hand over a batch of [`IndexedEntity`] records can seed a
//! cache at startup.

use crate::error::Result;
use crate::types::IndexedEntity;

/// Trait for suppliers of entity records
pub trait EntitySource {
    /// Fetch every record the source currently holds
    fn fetch_entities(&self) -> Result<Vec<IndexedEntity>>;
}

impl EntitySource for [IndexedEntity] {
    fn fetch_entities(&self) -> Result<Vec<IndexedEntity>> {
        Ok(self.to_vec())
    }
}

impl EntitySource for Vec<IndexedEntity> {
    fn fetch_entities(&self) -> Result<Vec<IndexedEntity>> {
        self.as_slice().fetch_entities()
    }
}

/// Records held as a JSON array, e.g. an export of the entity table.
#[derive(Debug, Clone)]
pub struct JsonEntitySource {
    json: String,
}

impl JsonEntitySource {
    pub fn new(json: impl Into<String>) -> Self {
        Self { json: json.into() }
    }
}

impl EntitySource for JsonEntitySource {
    fn fetch_entities(&self) -> Result<Vec<IndexedEntity>> {
        entities_from_json(&self.json)
    }
}

/// Parse a JSON array of entity records.
///
/// ```rust
/// use locus::source::entities_from_json;
///
/// let entities = entities_from_json(r#"[{"id": 1, "name": "Lakeside"}]"#)?;
/// assert_eq!(entities[0].name, "Lakeside");
/// # Ok::<(), locus::LocusError>(())
/// ```
pub fn entities_from_json(json: &str) -> Result<Vec<IndexedEntity>> {
    Ok(serde_json::from_str(json)?)
}
