//! Block type descriptors
//!
//! A [`BlockType`] is the registered, immutable description of a kind of
//! block: its declared fields, its primary parent, the mixins it composes, and
//! the views and handlers it exposes. Everything derived from the type graph is
//! computed exactly once, in [`BlockTypeBuilder::build`]:
//!
//! - the **linearization**: the type itself, then its parent's linearization,
//!   then each mixin's linearization in declaration order, keeping only the
//!   first occurrence of a type. The whole primary chain therefore comes
//!   before any mixin.
//! - the **resolved field set**: walking the linearization, the first field
//!   seen for a name wins; later same-named fields are silently shadowed.
//! - the **children capability**: the first explicit `has_children` flag along
//!   the linearization. A capable type without a `children` field gets one
//!   injected into its own declarations.
//! - the resolved **views** and **handlers**, first declaration wins.
//!
//! Each type owns a distinct field map; a subtype never aliases the map of
//! the type it extends.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::block::{Block, BlockError};
use super::field::Field;
use super::scope::Scope;
use super::value::FieldValue;
use crate::config::DEFAULT_ENTRY_POINT;
use crate::mixins::handlers::{Handler, HandlerFn};
use crate::mixins::views::{Fragment, View, ViewContext, ViewHandler};
use crate::request::{Request, Response};

/// Name of the field injected into children-capable types
pub const CHILDREN_FIELD: &str = "children";

/// Resolved field name → field mapping
pub type FieldMap = BTreeMap<String, Arc<Field>>;

/// Registered description of a kind of block
pub struct BlockType {
    name: String,
    entry_point: String,
    entry_point_flag: Option<String>,
    parent: Option<Arc<BlockType>>,
    mixins: Vec<Arc<BlockType>>,
    /// Linearized ancestors, excluding the type itself
    ancestors: Vec<Arc<BlockType>>,
    own_fields: FieldMap,
    fields: Arc<FieldMap>,
    has_children_flag: Option<bool>,
    has_children: bool,
    own_views: BTreeMap<String, Arc<View>>,
    views: BTreeMap<String, Arc<View>>,
    own_handlers: BTreeMap<String, Arc<Handler>>,
    handlers: BTreeMap<String, Arc<Handler>>,
}

impl BlockType {
    /// Start describing a new type
    pub fn builder(name: impl Into<String>) -> BlockTypeBuilder {
        BlockTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin family identifier stamped on exported nodes
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Primary parent, if any
    pub fn parent(&self) -> Option<&Arc<BlockType>> {
        self.parent.as_ref()
    }

    /// Mixins in declaration order
    pub fn mixins(&self) -> &[Arc<BlockType>] {
        &self.mixins
    }

    /// Linearized ancestors, excluding this type
    pub fn ancestors(&self) -> &[Arc<BlockType>] {
        &self.ancestors
    }

    /// Names of this type and its ancestors in resolution order
    pub fn linearization(&self) -> Vec<&str> {
        std::iter::once(self.name())
            .chain(self.ancestors.iter().map(|a| a.name()))
            .collect()
    }

    /// Whether `other` appears among this type's ancestors
    pub fn is_subtype_of(&self, other: &Arc<BlockType>) -> bool {
        self.ancestors.iter().any(|a| Arc::ptr_eq(a, other))
    }

    /// Fields declared directly on this type (including an injected `children`)
    pub fn own_fields(&self) -> &FieldMap {
        &self.own_fields
    }

    /// Resolved field set
    pub fn fields(&self) -> &Arc<FieldMap> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Arc<Field>> {
        self.fields.get(name)
    }

    /// Resolved children capability
    pub fn has_children(&self) -> bool {
        self.has_children
    }

    /// Flag declared on this type itself, if any
    pub fn has_children_flag(&self) -> Option<bool> {
        self.has_children_flag
    }

    pub fn view(&self, name: &str) -> Option<&Arc<View>> {
        self.views.get(name)
    }

    pub fn views(&self) -> impl Iterator<Item = &Arc<View>> {
        self.views.values()
    }

    pub fn handler(&self, name: &str) -> Option<&Arc<Handler>> {
        self.handlers.get(name)
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockType")
            .field("name", &self.name)
            .field("entry_point", &self.entry_point)
            .field("linearization", &self.linearization())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("has_children", &self.has_children)
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Errors raised while building a type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockTypeError {
    #[error("Block type name cannot be empty")]
    EmptyName,

    #[error("Invalid field name on {type_name}: {field:?}")]
    InvalidFieldName { type_name: String, field: String },

    #[error("Capability tags given for undeclared view: {0}")]
    UnknownView(String),
}

/// Declarative builder for [`BlockType`]
pub struct BlockTypeBuilder {
    name: String,
    entry_point: Option<String>,
    parent: Option<Arc<BlockType>>,
    mixins: Vec<Arc<BlockType>>,
    fields: BTreeMap<String, Field>,
    has_children: Option<bool>,
    views: BTreeMap<String, ViewHandler>,
    /// Capability side table, keyed by view name
    view_tags: BTreeMap<String, BTreeSet<String>>,
    handlers: BTreeMap<String, HandlerFn>,
}

impl BlockTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_point: None,
            parent: None,
            mixins: Vec::new(),
            fields: BTreeMap::new(),
            has_children: None,
            views: BTreeMap::new(),
            view_tags: BTreeMap::new(),
            handlers: BTreeMap::new(),
        }
    }

    /// Set the primary parent
    pub fn extends(mut self, parent: &Arc<BlockType>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Compose a mixin; mixins resolve after the primary chain, in call order
    pub fn mixin(mut self, mixin: &Arc<BlockType>) -> Self {
        self.mixins.push(Arc::clone(mixin));
        self
    }

    /// Declare a field; redeclaring a name replaces the earlier declaration
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Declare whether the type holds children
    pub fn has_children(mut self, has_children: bool) -> Self {
        self.has_children = Some(has_children);
        self
    }

    /// Override the plugin family identifier
    pub fn entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = Some(entry_point.into());
        self
    }

    /// Declare a view
    pub fn view<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&dyn Block, &ViewContext) -> Result<Fragment, BlockError> + Send + Sync + 'static,
    {
        self.views.insert(name.into(), Arc::new(handler));
        self
    }

    /// Tag a view with the functionalities it supports
    ///
    /// Repeated calls for the same view accumulate.
    pub fn supports<I, S>(mut self, view: impl Into<String>, functionalities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.view_tags
            .entry(view.into())
            .or_default()
            .extend(functionalities.into_iter().map(Into::into));
        self
    }

    /// Declare a request handler
    pub fn handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&dyn Block, &Request) -> Result<Response, BlockError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Resolve the type graph and freeze the descriptor
    pub fn build(self) -> Result<Arc<BlockType>, BlockTypeError> {
        let BlockTypeBuilder {
            name,
            entry_point,
            parent,
            mixins,
            fields,
            has_children,
            views,
            mut view_tags,
            handlers,
        } = self;

        if name.trim().is_empty() {
            return Err(BlockTypeError::EmptyName);
        }
        if let Some(bad) = fields.keys().find(|f| !is_valid_field_name(f)) {
            return Err(BlockTypeError::InvalidFieldName {
                type_name: name,
                field: bad.clone(),
            });
        }
        if let Some(unknown) = view_tags.keys().find(|v| !views.contains_key(*v)) {
            return Err(BlockTypeError::UnknownView(unknown.clone()));
        }

        let ancestors = linearize(parent.as_ref(), &mixins);

        let mut own_fields: FieldMap = fields
            .into_iter()
            .map(|(field_name, field)| {
                let field = Arc::new(field.named(&field_name));
                (field_name, field)
            })
            .collect();

        let mut resolved = own_fields.clone();
        for ancestor in &ancestors {
            for (field_name, field) in &ancestor.own_fields {
                match resolved.entry(field_name.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(Arc::clone(field));
                    }
                    Entry::Occupied(_) => {
                        trace!(
                            block_type = %name,
                            field = %field_name,
                            shadowed_in = %ancestor.name,
                            "field shadowed"
                        );
                    }
                }
            }
        }

        let resolved_has_children = has_children
            .or_else(|| ancestors.iter().find_map(|a| a.has_children_flag))
            .unwrap_or(false);

        if resolved_has_children && !resolved.contains_key(CHILDREN_FIELD) {
            let children = Arc::new(
                Field::list()
                    .scope(Scope::CHILDREN)
                    .default(FieldValue::List(Vec::new()))
                    .help("Usage ids of this block's children")
                    .named(CHILDREN_FIELD),
            );
            own_fields.insert(CHILDREN_FIELD.to_string(), Arc::clone(&children));
            resolved.insert(CHILDREN_FIELD.to_string(), children);
            debug!(block_type = %name, "injected children field");
        }

        let own_views: BTreeMap<String, Arc<View>> = views
            .into_iter()
            .map(|(view_name, handler)| {
                let functionalities = view_tags.remove(&view_name).unwrap_or_default();
                let view = Arc::new(View::new(view_name.clone(), handler, functionalities));
                (view_name, view)
            })
            .collect();
        let resolved_views = resolve_first_wins(&own_views, &ancestors, |a| &a.own_views);

        let own_handlers: BTreeMap<String, Arc<Handler>> = handlers
            .into_iter()
            .map(|(handler_name, func)| {
                let handler = Arc::new(Handler::new(handler_name.clone(), func));
                (handler_name, handler)
            })
            .collect();
        let resolved_handlers = resolve_first_wins(&own_handlers, &ancestors, |a| &a.own_handlers);

        let resolved_entry_point = entry_point
            .clone()
            .or_else(|| ancestors.iter().find_map(|a| a.entry_point_flag.clone()))
            .unwrap_or_else(|| DEFAULT_ENTRY_POINT.to_string());

        debug!(
            block_type = %name,
            fields = resolved.len(),
            ancestors = ancestors.len(),
            has_children = resolved_has_children,
            "built block type"
        );

        Ok(Arc::new(BlockType {
            name,
            entry_point: resolved_entry_point,
            entry_point_flag: entry_point,
            parent,
            mixins,
            ancestors,
            own_fields,
            fields: Arc::new(resolved),
            has_children_flag: has_children,
            has_children: resolved_has_children,
            own_views,
            views: resolved_views,
            own_handlers,
            handlers: resolved_handlers,
        }))
    }
}

fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Parent's linearization, then each mixin's, first occurrence kept
fn linearize(parent: Option<&Arc<BlockType>>, mixins: &[Arc<BlockType>]) -> Vec<Arc<BlockType>> {
    let mut order: Vec<Arc<BlockType>> = Vec::new();
    for base in parent.into_iter().chain(mixins.iter()) {
        for candidate in std::iter::once(base).chain(base.ancestors.iter()) {
            if !order.iter().any(|seen| Arc::ptr_eq(seen, candidate)) {
                order.push(Arc::clone(candidate));
            }
        }
    }
    order
}

fn resolve_first_wins<T, F>(
    own: &BTreeMap<String, Arc<T>>,
    ancestors: &[Arc<BlockType>],
    table: F,
) -> BTreeMap<String, Arc<T>>
where
    F: Fn(&BlockType) -> &BTreeMap<String, Arc<T>>,
{
    let mut resolved = own.clone();
    for ancestor in ancestors {
        for (key, item) in table(ancestor.as_ref()) {
            resolved.entry(key.clone()).or_insert_with(|| Arc::clone(item));
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Arc<BlockType> {
        BlockType::builder("base")
            .field("title", Field::string().scope(Scope::SETTINGS))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_binds_field_names() {
        let t = base();
        assert_eq!(t.field("title").and_then(|f| f.name()), Some("title"));
        assert_eq!(t.entry_point(), DEFAULT_ENTRY_POINT);
        assert!(t.parent().is_none());
        assert_eq!(t.linearization(), vec!["base"]);
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(BlockType::builder("  ").build().unwrap_err(), BlockTypeError::EmptyName);
    }

    #[test]
    fn test_invalid_field_name_rejected() {
        let err = BlockType::builder("t")
            .field("1st", Field::string())
            .build()
            .unwrap_err();
        assert!(matches!(err, BlockTypeError::InvalidFieldName { .. }));
    }

    #[test]
    fn test_tags_for_undeclared_view_rejected() {
        let err = BlockType::builder("t")
            .supports("student_view", ["mobile"])
            .build()
            .unwrap_err();
        assert_eq!(err, BlockTypeError::UnknownView("student_view".into()));
    }

    #[test]
    fn test_linearization_dedups_diamond() {
        let root = base();
        let left = BlockType::builder("left").extends(&root).build().unwrap();
        let right = BlockType::builder("right").extends(&root).build().unwrap();
        let bottom = BlockType::builder("bottom")
            .extends(&left)
            .mixin(&right)
            .build()
            .unwrap();

        assert_eq!(bottom.linearization(), vec!["bottom", "left", "base", "right"]);
        assert!(bottom.is_subtype_of(&root));
        assert!(bottom.is_subtype_of(&right));
        assert!(!root.is_subtype_of(&bottom));
    }

    #[test]
    fn test_entry_point_inherited() {
        let custom = BlockType::builder("custom")
            .entry_point("xblock_asides.v1")
            .build()
            .unwrap();
        let child = BlockType::builder("child").extends(&custom).build().unwrap();
        assert_eq!(child.entry_point(), "xblock_asides.v1");
    }

    #[test]
    fn test_redeclared_view_drops_inherited_tags() {
        let parent = BlockType::builder("parent")
            .view("student_view", |_, _| Ok(Fragment::new("parent")))
            .supports("student_view", ["multi_device"])
            .build()
            .unwrap();
        let child = BlockType::builder("child")
            .extends(&parent)
            .view("student_view", |_, _| Ok(Fragment::new("child")))
            .build()
            .unwrap();

        assert!(parent.view("student_view").unwrap().functionalities().contains("multi_device"));
        assert!(child.view("student_view").unwrap().functionalities().is_empty());
    }
}
