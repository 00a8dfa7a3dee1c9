//! Parent/child structure
//!
//! Only types whose resolved `has_children` flag is set carry a `children`
//! field (see [`CHILDREN_FIELD`]). On other types the children accessors fail
//! with [`BlockError::NoSuchField`] rather than pretending to be empty.

use std::sync::Arc;
use tracing::warn;

use crate::core::block::{Block, BlockError, BlockInstance};
use crate::core::block_type::CHILDREN_FIELD;
use crate::core::field::{FieldError, FieldType};
use crate::core::value::FieldValue;
use crate::mixins::scoped_storage::ScopedStorageMixin;
use crate::mixins::xml_serialization::export_block;
use crate::xml::{XmlElement, XmlNode};

pub trait HierarchyMixin: Block {
    /// Whether the block's type holds children
    fn has_children(&self) -> bool {
        self.instance().block_type().has_children()
    }

    /// Usage ids of the children, in order
    fn children(&self) -> Result<Vec<String>, BlockError> {
        let value = self.instance().get(CHILDREN_FIELD)?;
        match value {
            FieldValue::Null => Ok(Vec::new()),
            FieldValue::List(items) => items
                .into_iter()
                .map(|item| match item {
                    FieldValue::String(id) => Ok(id),
                    other => Err(BlockError::from(FieldError::TypeMismatch {
                        expected: FieldType::String,
                        found: other.kind().to_string(),
                    })),
                })
                .collect(),
            other => Err(BlockError::from(FieldError::TypeMismatch {
                expected: FieldType::List,
                found: other.kind().to_string(),
            })),
        }
    }

    /// Replace the children list
    fn set_children(&self, usage_ids: Vec<String>) -> Result<(), BlockError> {
        self.instance().set(CHILDREN_FIELD, usage_ids)
    }

    /// Append one child usage id
    fn add_child(&self, usage_id: impl Into<String>) -> Result<(), BlockError>
    where
        Self: Sized,
    {
        let mut ids = self.children()?;
        ids.push(usage_id.into());
        self.set_children(ids)
    }

    /// Resolve one child through the runtime
    fn get_child(&self, usage_id: &str) -> Result<Arc<BlockInstance>, BlockError> {
        self.instance().runtime().get_block(usage_id)
    }

    /// Resolve every child through the runtime
    fn get_children(&self) -> Result<Vec<Arc<BlockInstance>>, BlockError> {
        self.children()?
            .iter()
            .map(|id| self.get_child(id))
            .collect()
    }

    /// Export each child as a nested element of `node`
    ///
    /// Fails with [`BlockError::ChildCycle`] if a block is reached again
    /// below itself.
    fn add_children_to_node(&self, node: &mut dyn XmlNode) -> Result<(), BlockError> {
        let block = self.instance();
        let mut ancestors = vec![block.scope_ids().usage_id.clone()];
        export_children(block, node, &mut ancestors)
    }
}

impl<T: Block> HierarchyMixin for T {}

/// Walk `block`'s children depth first; `ancestors` holds the usage ids on
/// the path from the export root down to `block`
pub(crate) fn export_children(
    block: &BlockInstance,
    node: &mut dyn XmlNode,
    ancestors: &mut Vec<String>,
) -> Result<(), BlockError> {
    for usage_id in block.children()? {
        if ancestors.contains(&usage_id) {
            warn!(usage_id = %usage_id, path = ?ancestors, "child cycle during export");
            return Err(BlockError::ChildCycle(usage_id));
        }
        let child = block.get_child(&usage_id)?;
        let mut element = XmlElement::new(child.block_type().name());
        ancestors.push(usage_id);
        export_block(&child, &mut element, ancestors)?;
        ancestors.pop();
        node.append_child(element);
    }
    Ok(())
}
