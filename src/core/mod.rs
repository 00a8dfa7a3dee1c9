//! Core block abstractions and types
//!
//! This module defines scopes, field declarations, the storage contract, block
//! type descriptors and block instances: everything the mixins build on.

pub mod block;
pub mod block_type;
pub mod field;
pub mod registry;
pub mod scope;
pub mod storage;
pub mod value;

pub use block::{Block, BlockError, BlockInstance};
pub use block_type::{BlockType, BlockTypeBuilder, BlockTypeError, FieldMap, CHILDREN_FIELD};
pub use field::{Field, FieldDefault, FieldError, FieldType};
pub use registry::{RegistryError, TypeRegistry};
pub use scope::{BlockScope, Scope, ScopeIds, UserScope};
pub use storage::{
    DictFieldData, FieldData, ReadOnlyFieldData, SplitFieldData, StorageError, StorageKey,
};
pub use value::FieldValue;
