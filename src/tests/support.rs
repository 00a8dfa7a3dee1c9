//! Shared fixtures for the scenario tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::UniqueIdPolicy;
use crate::core::block::{BlockError, BlockInstance};
use crate::core::block_type::BlockType;
use crate::core::scope::ScopeIds;
use crate::core::storage::{DictFieldData, FieldData};
use crate::runtime::Runtime;

/// Runtime with predictable unique ids and no child resolution
pub struct StubRuntime {
    policy: UniqueIdPolicy,
    issued: AtomicUsize,
}

impl StubRuntime {
    pub fn new(policy: UniqueIdPolicy) -> Arc<Self> {
        Arc::new(Self {
            policy,
            issued: AtomicUsize::new(0),
        })
    }

    /// Number of ids generated so far
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl Runtime for StubRuntime {
    fn get_block(&self, usage_id: &str) -> Result<Arc<BlockInstance>, BlockError> {
        Err(BlockError::NoSuchBlock(usage_id.to_string()))
    }

    fn generate_unique_id(&self, scope_ids: &ScopeIds, field_name: &str) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}-{}", scope_ids.usage_id, field_name, n)
    }

    fn unique_id_policy(&self) -> UniqueIdPolicy {
        self.policy
    }
}

pub fn scope_ids(block_type: &BlockType) -> ScopeIds {
    ScopeIds::new("user_id", block_type.name(), "def_id", "usage_id")
}

/// A block over fresh in-memory storage
pub fn make_block(block_type: &Arc<BlockType>, runtime: Arc<StubRuntime>) -> BlockInstance {
    make_block_with(block_type, runtime, Arc::new(DictFieldData::new()))
}

pub fn make_block_with(
    block_type: &Arc<BlockType>,
    runtime: Arc<StubRuntime>,
    field_data: Arc<dyn FieldData>,
) -> BlockInstance {
    BlockInstance::new(
        Arc::clone(block_type),
        scope_ids(block_type),
        field_data,
        runtime,
    )
}
