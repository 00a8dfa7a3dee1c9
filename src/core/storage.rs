//! Field storage contract
//!
//! The core never persists anything itself. Field reads and writes go through
//! the [`FieldData`] trait, keyed by a [`StorageKey`] built from the field's
//! scope, the block's [`ScopeIds`] and the field name.
//!
//! Three small backends ship with the crate:
//! - [`DictFieldData`]: in-memory map, used by tests and embedders
//! - [`SplitFieldData`]: routes each scope to its own backend
//! - [`ReadOnlyFieldData`]: wraps a backend and rejects writes

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::scope::{Scope, ScopeIds};
use super::value::FieldValue;

/// Address of one stored field value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub scope: Scope,
    pub scope_ids: ScopeIds,
    pub field_name: String,
}

impl StorageKey {
    pub fn new(scope: Scope, scope_ids: ScopeIds, field_name: impl Into<String>) -> Self {
        Self {
            scope,
            scope_ids,
            field_name: field_name.into(),
        }
    }

    /// User id this key is partitioned by, if the scope is per-user
    pub fn user_id(&self) -> Option<&str> {
        self.scope_ids.user_id_for(&self.scope)
    }

    /// Block id this key is partitioned by, if any
    pub fn block_scope_id(&self) -> Option<&str> {
        self.scope_ids.block_id_for(&self.scope)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.scope,
            self.user_id().unwrap_or("-"),
            self.block_scope_id().unwrap_or("-"),
            self.field_name
        )
    }
}

/// Storage backend errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No value stored under the key
    #[error("No value stored for {0}")]
    NotFound(StorageKey),

    /// No backend handles the key's scope
    #[error("No storage route for scope {0}")]
    NoRoute(Scope),

    /// Backend does not accept writes
    #[error("Storage is read-only: {0}")]
    ReadOnly(StorageKey),

    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Key-value store holding field values
///
/// Implementations decide how keys map to physical storage. Concurrent access
/// safety is the implementation's responsibility.
pub trait FieldData: Send + Sync {
    /// Read the stored value, or [`StorageError::NotFound`]
    fn get(&self, key: &StorageKey) -> Result<FieldValue, StorageError>;

    /// Store a value
    fn set(&self, key: &StorageKey, value: FieldValue) -> Result<(), StorageError>;

    /// Remove a stored value
    fn delete(&self, key: &StorageKey) -> Result<(), StorageError>;

    /// Whether a value is explicitly stored (defaults don't count)
    fn has(&self, key: &StorageKey) -> Result<bool, StorageError>;

    /// Store several values
    fn set_many(&self, items: Vec<(StorageKey, FieldValue)>) -> Result<(), StorageError> {
        for (key, value) in items {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Backend-supplied default, consulted before the field's own default
    fn default_value(&self, _key: &StorageKey) -> Result<Option<FieldValue>, StorageError> {
        Ok(None)
    }
}

/// Physical key used by [`DictFieldData`]
///
/// Only the ids the scope actually partitions by take part, so usages of the
/// same definition share `content` values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DictKey {
    scope: Scope,
    user_id: Option<String>,
    block_id: Option<String>,
    field_name: String,
}

impl From<&StorageKey> for DictKey {
    fn from(key: &StorageKey) -> Self {
        Self {
            scope: key.scope,
            user_id: key.user_id().map(str::to_string),
            block_id: key.block_scope_id().map(str::to_string),
            field_name: key.field_name.clone(),
        }
    }
}

/// In-memory field storage
#[derive(Default)]
pub struct DictFieldData {
    values: RwLock<HashMap<DictKey, FieldValue>>,
}

impl DictFieldData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Remove every stored value
    pub fn clear(&self) {
        self.values.write().clear();
    }
}

impl FieldData for DictFieldData {
    fn get(&self, key: &StorageKey) -> Result<FieldValue, StorageError> {
        self.values
            .read()
            .get(&DictKey::from(key))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.clone()))
    }

    fn set(&self, key: &StorageKey, value: FieldValue) -> Result<(), StorageError> {
        self.values.write().insert(DictKey::from(key), value);
        Ok(())
    }

    fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.values
            .write()
            .remove(&DictKey::from(key))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.clone()))
    }

    fn has(&self, key: &StorageKey) -> Result<bool, StorageError> {
        Ok(self.values.read().contains_key(&DictKey::from(key)))
    }

    fn set_many(&self, items: Vec<(StorageKey, FieldValue)>) -> Result<(), StorageError> {
        let mut values = self.values.write();
        for (key, value) in items {
            values.insert(DictKey::from(&key), value);
        }
        Ok(())
    }
}

/// Routes each scope to a dedicated backend
#[derive(Default, Clone)]
pub struct SplitFieldData {
    routes: HashMap<Scope, Arc<dyn FieldData>>,
}

impl SplitFieldData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send values of `scope` to `backend`
    pub fn with_route(mut self, scope: Scope, backend: Arc<dyn FieldData>) -> Self {
        self.routes.insert(scope, backend);
        self
    }

    fn route(&self, key: &StorageKey) -> Result<&Arc<dyn FieldData>, StorageError> {
        self.routes
            .get(&key.scope)
            .ok_or(StorageError::NoRoute(key.scope))
    }
}

impl FieldData for SplitFieldData {
    fn get(&self, key: &StorageKey) -> Result<FieldValue, StorageError> {
        self.route(key)?.get(key)
    }

    fn set(&self, key: &StorageKey, value: FieldValue) -> Result<(), StorageError> {
        self.route(key)?.set(key, value)
    }

    fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.route(key)?.delete(key)
    }

    fn has(&self, key: &StorageKey) -> Result<bool, StorageError> {
        self.route(key)?.has(key)
    }

    /// Every key must have a route before anything is written
    fn set_many(&self, items: Vec<(StorageKey, FieldValue)>) -> Result<(), StorageError> {
        for (key, _) in &items {
            self.route(key)?;
        }
        for (key, value) in items {
            self.route(&key)?.set(&key, value)?;
        }
        Ok(())
    }

    fn default_value(&self, key: &StorageKey) -> Result<Option<FieldValue>, StorageError> {
        self.route(key)?.default_value(key)
    }
}

/// Read-only view over another backend
pub struct ReadOnlyFieldData {
    source: Arc<dyn FieldData>,
}

impl ReadOnlyFieldData {
    pub fn new(source: Arc<dyn FieldData>) -> Self {
        Self { source }
    }
}

impl FieldData for ReadOnlyFieldData {
    fn get(&self, key: &StorageKey) -> Result<FieldValue, StorageError> {
        self.source.get(key)
    }

    fn set(&self, key: &StorageKey, _value: FieldValue) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly(key.clone()))
    }

    fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly(key.clone()))
    }

    fn has(&self, key: &StorageKey) -> Result<bool, StorageError> {
        self.source.has(key)
    }

    fn default_value(&self, key: &StorageKey) -> Result<Option<FieldValue>, StorageError> {
        self.source.default_value(key)
    }
}
