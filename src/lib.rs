//! XBlock Core - field and mixin layer for pluggable courseware blocks
//!
//! This crate provides block type descriptors with scoped, typed fields,
//! the mixins every block shares (scoped storage, hierarchy, views,
//! handlers, index info, XML export) and an in-process reference runtime.

pub mod config;
pub mod core;
pub mod mixins;
pub mod request;
pub mod runtime;
pub mod xml;
mod tests;

// Re-export commonly used types
pub use crate::config::{CoreConfig, UniqueIdPolicy};
pub use crate::core::{
    Block, BlockError, BlockInstance, BlockType, Field, FieldData, FieldValue, Scope, ScopeIds,
    TypeRegistry,
};
pub use crate::mixins::{
    HandlersMixin, HierarchyMixin, IndexInfoMixin, ScopedStorageMixin, ViewsMixin,
    XmlSerializationMixin,
};
pub use crate::request::{Request, Response};
pub use crate::runtime::{BlockRuntime, Runtime};
pub use crate::xml::{XmlElement, XmlNode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
