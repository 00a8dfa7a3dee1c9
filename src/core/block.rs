//! Block trait and instance
//!
//! A [`BlockInstance`] ties a resolved [`BlockType`] to the [`ScopeIds`] of one
//! usage, a storage backend and the runtime that built it. Concrete block
//! types wrap an instance and implement [`Block`] to pick up the mixin traits.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::block_type::BlockType;
use super::field::FieldError;
use super::scope::ScopeIds;
use super::storage::{FieldData, StorageError};
use crate::config::UniqueIdPolicy;
use crate::runtime::Runtime;
use crate::xml::XmlError;

/// Core block trait; every mixin builds on it
pub trait Block: Send + Sync {
    /// The instance backing this block
    fn instance(&self) -> &BlockInstance;
}

/// One constructed block
pub struct BlockInstance {
    block_type: Arc<BlockType>,
    scope_ids: ScopeIds,
    field_data: Arc<dyn FieldData>,
    runtime: Arc<dyn Runtime>,
    /// Unique ids generated for unset fields, keyed by field name
    generated_ids: Mutex<HashMap<String, String>>,
}

impl BlockInstance {
    pub fn new(
        block_type: Arc<BlockType>,
        scope_ids: ScopeIds,
        field_data: Arc<dyn FieldData>,
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        Self {
            block_type,
            scope_ids,
            field_data,
            runtime,
            generated_ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn block_type(&self) -> &Arc<BlockType> {
        &self.block_type
    }

    pub fn scope_ids(&self) -> &ScopeIds {
        &self.scope_ids
    }

    pub fn field_data(&self) -> &dyn FieldData {
        self.field_data.as_ref()
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Unique id to report for an unset field
    ///
    /// Under [`UniqueIdPolicy::PerInstance`] the first id generated for a field
    /// is reused for the life of this instance; it is never written to storage.
    pub(crate) fn unique_id_for(&self, field_name: &str) -> String {
        match self.runtime.unique_id_policy() {
            UniqueIdPolicy::PerRead => self.runtime.generate_unique_id(&self.scope_ids, field_name),
            UniqueIdPolicy::PerInstance => {
                let cached = self.generated_ids.lock().get(field_name).cloned();
                if let Some(id) = cached {
                    return id;
                }
                // Generated unlocked: the runtime may read this block's fields
                let id = self.runtime.generate_unique_id(&self.scope_ids, field_name);
                self.generated_ids
                    .lock()
                    .entry(field_name.to_string())
                    .or_insert(id)
                    .clone()
            }
        }
    }
}

impl Block for BlockInstance {
    fn instance(&self) -> &BlockInstance {
        self
    }
}

impl fmt::Debug for BlockInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockInstance")
            .field("block_type", &self.block_type.name())
            .field("scope_ids", &self.scope_ids)
            .finish()
    }
}

/// Block errors
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// Storage backend failure, passed through unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Value coercion or conversion failure
    #[error(transparent)]
    Field(#[from] FieldError),

    /// XML rendering or parsing failure
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("No such field: {0}")]
    NoSuchField(String),

    #[error("No such view: {0}")]
    NoSuchView(String),

    #[error("No such handler: {0}")]
    NoSuchHandler(String),

    #[error("No such block: {0}")]
    NoSuchBlock(String),

    /// A block appears among its own descendants
    #[error("Child cycle through block: {0}")]
    ChildCycle(String),

    #[error("Unknown block type: {0}")]
    UnknownBlockType(String),

    /// A view or handler reported a failure
    #[error("Execution failed: {0}")]
    ExecutionError(String),
}
