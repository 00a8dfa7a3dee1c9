//! Index metadata hook

use std::collections::BTreeMap;

use crate::core::value::FieldValue;

/// Metadata handed to external indexers
pub type IndexDictionary = BTreeMap<String, FieldValue>;

/// Extension point for search indexing
pub trait IndexInfoMixin {
    /// Metadata to index for this block; empty unless overridden
    fn index_dictionary(&self) -> IndexDictionary {
        IndexDictionary::new()
    }
}
