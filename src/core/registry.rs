//! Type Registry - plugin identity registry for block types
//!
//! This module provides a thread-safe registry mapping block type names to
//! their built [`BlockType`] descriptors. It supports:
//! - Type registration, replacement (reload) and unregistration
//! - Lookup by name, or by plugin family (entry point)
//! - Search by name

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::block_type::BlockType;

/// Registry of block types, keyed by type name
///
/// The registry uses `Arc<RwLock<BTreeMap>>` so clones share one table and
/// listings come back in name order.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: Arc<RwLock<BTreeMap<String, Arc<BlockType>>>>,
}

impl TypeRegistry {
    /// Create a new empty registry
    ///
    /// # Example
    /// ```
    /// use xblock_core::core::registry::TypeRegistry;
    ///
    /// let registry = TypeRegistry::new();
    /// assert_eq!(registry.count(), 0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new type
    ///
    /// # Returns
    /// * `Ok(())` if registration succeeds
    /// * `Err(RegistryError::DuplicateType)` if the name is already taken
    pub fn register(&self, block_type: Arc<BlockType>) -> Result<(), RegistryError> {
        let name = block_type.name().to_string();
        let mut types = self.types.write();

        if types.contains_key(&name) {
            return Err(RegistryError::DuplicateType(name));
        }

        debug!(block_type = %name, entry_point = %block_type.entry_point(), "registered block type");
        types.insert(name, block_type);
        Ok(())
    }

    /// Register `block_type`, replacing any type with the same name
    ///
    /// Returns the replaced type. Instances built from the old descriptor keep
    /// using it.
    pub fn replace(&self, block_type: Arc<BlockType>) -> Option<Arc<BlockType>> {
        let name = block_type.name().to_string();
        let previous = self.types.write().insert(name.clone(), block_type);
        if previous.is_some() {
            debug!(block_type = %name, "reloaded block type");
        }
        previous
    }

    /// Unregister a type
    pub fn unregister(&self, name: &str) -> Result<Arc<BlockType>, RegistryError> {
        self.types
            .write()
            .remove(name)
            .ok_or_else(|| RegistryError::TypeNotFound(name.to_string()))
    }

    /// Get a type by name
    pub fn get(&self, name: &str) -> Result<Arc<BlockType>, RegistryError> {
        self.types
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::TypeNotFound(name.to_string()))
    }

    /// Plugin family of a registered type
    pub fn entry_point_of(&self, name: &str) -> Result<String, RegistryError> {
        self.get(name).map(|t| t.entry_point().to_string())
    }

    /// All registered types, by name
    pub fn all_types(&self) -> Vec<Arc<BlockType>> {
        self.types.read().values().cloned().collect()
    }

    /// Types belonging to one plugin family
    pub fn types_in_family(&self, entry_point: &str) -> Vec<Arc<BlockType>> {
        self.types
            .read()
            .values()
            .filter(|t| t.entry_point() == entry_point)
            .cloned()
            .collect()
    }

    /// Types whose name contains `query` (case-insensitive)
    pub fn search(&self, query: &str) -> Vec<Arc<BlockType>> {
        let query = query.to_lowercase();
        self.types
            .read()
            .values()
            .filter(|t| t.name().to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.types.read().len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    pub fn clear(&self) {
        self.types.write().clear();
    }
}

/// Registry error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Block type not found: {0}")]
    TypeNotFound(String),

    #[error("Duplicate block type: {0}")]
    DuplicateType(String),

    /// Type belongs to a plugin family the runtime does not load
    #[error("Block type {name} belongs to family {found}, expected {expected}")]
    FamilyMismatch {
        name: String,
        expected: String,
        found: String,
    },
}
