//! XML export and import of field values
//!
//! Export writes one attribute per field onto a caller-supplied node:
//!
//! - unset fields are skipped unless the field is force-exported, in which
//!   case its default (possibly a generated id) is written
//! - set fields are written with their current value, converted by the
//!   field's type
//! - `children`, `parent` and `content` never become attributes; `content`
//!   becomes the node text and children become nested elements
//! - the node is stamped with [`FAMILY_ATTRIBUTE`] naming the type's plugin
//!   family
//!
//! Fields are visited in name order, so a fixed field set and fixed instance
//! state always yield the same attributes.

use tracing::{debug, trace};

use crate::core::block::{Block, BlockError, BlockInstance};
use crate::mixins::hierarchy::{export_children, HierarchyMixin};
use crate::xml::{XmlNode, FAMILY_ATTRIBUTE};

/// Fields that are never written as attributes
pub const STRUCTURAL_FIELDS: [&str; 3] = ["children", "parent", "content"];

/// Field written as node text
pub const CONTENT_FIELD: &str = "content";

pub trait XmlSerializationMixin: Block {
    /// Write this block's fields onto `node`, followed by its children
    fn add_xml_to_node(&self, node: &mut dyn XmlNode) -> Result<(), BlockError> {
        let block = self.instance();
        let mut ancestors = vec![block.scope_ids().usage_id.clone()];
        export_block(block, node, &mut ancestors)
    }

    /// Load field values from `node`'s attributes and text
    ///
    /// Every value is converted before any is stored, so a bad value leaves
    /// the block untouched. Returns the names of attributes that did not
    /// match a writable field.
    fn apply_xml_attributes(&self, node: &dyn XmlNode) -> Result<Vec<String>, BlockError> {
        let block = self.instance();
        let block_type = block.block_type();
        let mut ignored = Vec::new();
        let mut updates = Vec::new();

        for name in node.attribute_names() {
            if name == FAMILY_ATTRIBUTE {
                continue;
            }
            let field = match block_type.field(&name) {
                Some(field) if !STRUCTURAL_FIELDS.contains(&name.as_str()) => field,
                _ => {
                    debug!(block_type = %block_type.name(), attribute = %name, "ignoring xml attribute");
                    ignored.push(name);
                    continue;
                }
            };
            if let Some(text) = node.attribute(&name) {
                updates.push((field.key_for(block)?, field.from_string(text)?));
            }
        }

        if let (Some(text), Some(content)) = (node.text(), block_type.field(CONTENT_FIELD)) {
            updates.push((content.key_for(block)?, content.from_string(text)?));
        }

        debug!(block_type = %block_type.name(), values = updates.len(), "importing xml values");
        block.field_data().set_many(updates)?;
        Ok(ignored)
    }
}

impl<T: Block> XmlSerializationMixin for T {}

/// Export `block` onto `node`; `ancestors` ends with `block`'s own usage id
pub(crate) fn export_block(
    block: &BlockInstance,
    node: &mut dyn XmlNode,
    ancestors: &mut Vec<String>,
) -> Result<(), BlockError> {
    let block_type = block.block_type();

    node.set_attribute(FAMILY_ATTRIBUTE, block_type.entry_point());

    let mut exported = 0usize;
    for (name, field) in block_type.fields().iter() {
        if STRUCTURAL_FIELDS.contains(&name.as_str()) {
            continue;
        }
        if field.is_set_on(block)? || field.is_force_export() {
            let value = field.read_from(block)?;
            node.set_attribute(name, &field.to_string(&value)?);
            exported += 1;
        } else {
            trace!(block_type = %block_type.name(), field = %name, "skipping unset field");
        }
    }

    if let Some(content) = block_type.field(CONTENT_FIELD) {
        if content.is_set_on(block)? || content.is_force_export() {
            let value = content.read_from(block)?;
            node.set_text(&content.to_string(&value)?);
        }
    }

    if block.has_children() {
        export_children(block, node, ancestors)?;
    }

    debug!(
        block_type = %block_type.name(),
        usage_id = %block.scope_ids().usage_id,
        attributes = exported,
        "exported block to xml"
    );
    Ok(())
}
