//! Block runtime
//!
//! [`Runtime`] is the host-facing contract blocks call back into: child
//! resolution and unique-id generation. [`BlockRuntime`] is an in-process
//! implementation that constructs blocks from a [`TypeRegistry`] over one
//! shared storage backend.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{CoreConfig, UniqueIdPolicy};
use crate::core::block::{BlockError, BlockInstance};
use crate::core::block_type::BlockType;
use crate::core::registry::{RegistryError, TypeRegistry};
use crate::core::scope::ScopeIds;
use crate::core::storage::FieldData;

/// Services a host provides to blocks
pub trait Runtime: Send + Sync {
    /// Construct the block registered under `usage_id`
    fn get_block(&self, usage_id: &str) -> Result<Arc<BlockInstance>, BlockError>;

    /// A new opaque id for an unset unique-id field
    fn generate_unique_id(&self, _scope_ids: &ScopeIds, _field_name: &str) -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn unique_id_policy(&self) -> UniqueIdPolicy {
        UniqueIdPolicy::PerInstance
    }
}

/// In-process runtime
pub struct BlockRuntime {
    this: Weak<BlockRuntime>,
    registry: TypeRegistry,
    field_data: Arc<dyn FieldData>,
    config: CoreConfig,
    usages: RwLock<HashMap<String, ScopeIds>>,
}

impl BlockRuntime {
    /// Create a runtime with the default configuration
    pub fn new(field_data: Arc<dyn FieldData>) -> Arc<Self> {
        Self::with_config(field_data, CoreConfig::default())
    }

    pub fn with_config(field_data: Arc<dyn FieldData>, config: CoreConfig) -> Arc<Self> {
        debug!(entry_point = %config.entry_point, unique_ids = ?config.unique_ids, "creating block runtime");
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            registry: TypeRegistry::new(),
            field_data,
            config,
            usages: RwLock::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn field_data(&self) -> &Arc<dyn FieldData> {
        &self.field_data
    }

    /// Make a type constructible; only the configured family is accepted
    pub fn register_type(&self, block_type: Arc<BlockType>) -> Result<(), RegistryError> {
        if block_type.entry_point() != self.config.entry_point {
            warn!(
                block_type = %block_type.name(),
                entry_point = %block_type.entry_point(),
                "rejecting block type from another family"
            );
            return Err(RegistryError::FamilyMismatch {
                name: block_type.name().to_string(),
                expected: self.config.entry_point.clone(),
                found: block_type.entry_point().to_string(),
            });
        }
        self.registry.register(block_type)
    }

    /// Record the identifiers of a usage so it can be resolved by id later
    pub fn register_usage(&self, scope_ids: ScopeIds) {
        debug!(usage_id = %scope_ids.usage_id, block_type = %scope_ids.block_type, "registered usage");
        self.usages
            .write()
            .insert(scope_ids.usage_id.clone(), scope_ids);
    }

    /// Allocate a fresh definition and usage of `type_name` for `user_id`
    pub fn create_usage(&self, type_name: &str, user_id: &str) -> Result<ScopeIds, BlockError> {
        if !self.registry.contains(type_name) {
            return Err(BlockError::UnknownBlockType(type_name.to_string()));
        }
        let def_id = format!("{}-def-{}", type_name, Uuid::new_v4().simple());
        let usage_id = format!("{}-usage-{}", type_name, Uuid::new_v4().simple());
        let scope_ids = ScopeIds::new(user_id, type_name, def_id, usage_id);
        self.register_usage(scope_ids.clone());
        Ok(scope_ids)
    }

    pub fn usage_count(&self) -> usize {
        self.usages.read().len()
    }

    /// Build an instance of `type_name` bound to `scope_ids`
    pub fn construct_block(
        &self,
        type_name: &str,
        scope_ids: ScopeIds,
    ) -> Result<Arc<BlockInstance>, BlockError> {
        let block_type = self.registry.get(type_name).map_err(|e| match e {
            RegistryError::TypeNotFound(name) => BlockError::UnknownBlockType(name),
            other => BlockError::ExecutionError(other.to_string()),
        })?;
        let runtime: Arc<dyn Runtime> = self
            .this
            .upgrade()
            .ok_or_else(|| BlockError::ExecutionError("runtime has been dropped".to_string()))?;

        debug!(block_type = %type_name, usage_id = %scope_ids.usage_id, "constructing block");
        Ok(Arc::new(BlockInstance::new(
            block_type,
            scope_ids,
            Arc::clone(&self.field_data),
            runtime,
        )))
    }
}

impl Runtime for BlockRuntime {
    fn get_block(&self, usage_id: &str) -> Result<Arc<BlockInstance>, BlockError> {
        let scope_ids = self
            .usages
            .read()
            .get(usage_id)
            .cloned()
            .ok_or_else(|| BlockError::NoSuchBlock(usage_id.to_string()))?;
        let type_name = scope_ids.block_type.clone();
        self.construct_block(&type_name, scope_ids)
    }

    fn unique_id_policy(&self) -> UniqueIdPolicy {
        self.config.unique_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::Field;
    use crate::core::storage::DictFieldData;
    use crate::core::value::FieldValue;
    use crate::mixins::ScopedStorageMixin;

    fn runtime() -> Arc<BlockRuntime> {
        let runtime = BlockRuntime::new(Arc::new(DictFieldData::new()));
        runtime
            .register_type(
                BlockType::builder("html")
                    .field("data", Field::string().default("<p/>"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        runtime
    }

    #[test]
    fn test_rejects_other_family() {
        let runtime = runtime();
        let aside = BlockType::builder("thumbs")
            .entry_point("xblock_asides.v1")
            .build()
            .unwrap();

        let err = runtime.register_type(aside).unwrap_err();
        assert!(matches!(err, RegistryError::FamilyMismatch { .. }));
    }

    #[test]
    fn test_construct_unknown_type() {
        let runtime = runtime();
        let err = runtime
            .construct_block("video", ScopeIds::new("u", "video", "d", "v"))
            .unwrap_err();
        assert!(matches!(err, BlockError::UnknownBlockType(name) if name == "video"));
    }

    #[test]
    fn test_get_block_resolves_usage() {
        let runtime = runtime();
        let ids = runtime.create_usage("html", "student").unwrap();

        let block = runtime.get_block(&ids.usage_id).unwrap();
        assert_eq!(block.scope_ids(), &ids);
        assert_eq!(block.get("data").unwrap(), FieldValue::from("<p/>"));
        assert!(matches!(
            runtime.get_block("missing"),
            Err(BlockError::NoSuchBlock(_))
        ));
    }

    #[test]
    fn test_policy_from_config() {
        let config = CoreConfig {
            unique_ids: UniqueIdPolicy::PerRead,
            ..CoreConfig::default()
        };
        let runtime = BlockRuntime::with_config(Arc::new(DictFieldData::new()), config);
        assert_eq!(runtime.unique_id_policy(), UniqueIdPolicy::PerRead);

        let ids = ScopeIds::new("u", "html", "d", "usage");
        let first = runtime.generate_unique_id(&ids, "name");
        assert_eq!(first.len(), 32);
        assert_ne!(first, runtime.generate_unique_id(&ids, "name"));
    }
}
