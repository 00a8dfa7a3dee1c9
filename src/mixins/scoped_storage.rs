//! Scoped field storage
//!
//! Field access by name on any [`Block`]. The resolved field set itself is
//! computed once per type by
//! [`BlockTypeBuilder::build`](crate::core::block_type::BlockTypeBuilder::build);
//! this trait only reads it and routes values through the instance's backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::block::{Block, BlockError};
use crate::core::block_type::FieldMap;
use crate::core::field::Field;
use crate::core::value::FieldValue;

pub trait ScopedStorageMixin: Block {
    /// Resolved field set of the block's type
    fn fields(&self) -> &Arc<FieldMap> {
        self.instance().block_type().fields()
    }

    /// Look up a declared field
    fn field(&self, name: &str) -> Result<&Arc<Field>, BlockError> {
        self.fields()
            .get(name)
            .ok_or_else(|| BlockError::NoSuchField(name.to_string()))
    }

    /// Current value, falling back to the field's default
    fn get(&self, name: &str) -> Result<FieldValue, BlockError> {
        self.field(name)?.read_from(self.instance())
    }

    /// Store a value
    fn set(&self, name: &str, value: impl Into<FieldValue>) -> Result<(), BlockError>
    where
        Self: Sized,
    {
        self.field(name)?.write_to(self.instance(), value.into())
    }

    /// Remove the stored value so the default applies again
    fn delete(&self, name: &str) -> Result<(), BlockError> {
        self.field(name)?.delete_from(self.instance())
    }

    /// Whether a value is explicitly stored
    fn is_set(&self, name: &str) -> Result<bool, BlockError> {
        self.field(name)?.is_set_on(self.instance())
    }

    /// Values of every explicitly stored field, by name
    fn explicitly_set_values(&self) -> Result<BTreeMap<String, FieldValue>, BlockError> {
        let mut values = BTreeMap::new();
        for (name, field) in self.fields().iter() {
            if field.is_set_on(self.instance())? {
                values.insert(name.clone(), field.read_from(self.instance())?);
            }
        }
        Ok(values)
    }
}

impl<T: Block> ScopedStorageMixin for T {}
