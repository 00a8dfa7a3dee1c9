//! Block mixins
//!
//! Behaviour shared by every block, expressed as traits with default methods.
//! Storage, hierarchy, handler and XML support are implemented for every
//! [`Block`](crate::core::Block). Index info and view capability negotiation
//! are opt-in so a concrete block can override their policy.

pub mod handlers;
pub mod hierarchy;
pub mod index_info;
pub mod scoped_storage;
pub mod views;
pub mod xml_serialization;

pub use handlers::HandlersMixin;
pub use hierarchy::HierarchyMixin;
pub use index_info::{IndexDictionary, IndexInfoMixin};
pub use scoped_storage::ScopedStorageMixin;
pub use views::{Fragment, View, ViewContext, ViewsMixin};
pub use xml_serialization::XmlSerializationMixin;
