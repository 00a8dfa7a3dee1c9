//! Views and capability negotiation
//!
//! Types tag each view with the functionalities it supports, using
//! [`BlockTypeBuilder::supports`](crate::core::block_type::BlockTypeBuilder::supports).
//! The tags are metadata only. Hosts ask [`ViewsMixin::has_support`] whether a
//! view supports a functionality, and implementors are free to override that
//! policy, so callers must never read the tags directly to make the decision.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::core::block::{Block, BlockError};
use crate::core::value::FieldValue;

/// Context passed to a view
pub type ViewContext = BTreeMap<String, FieldValue>;

/// View implementation
pub type ViewHandler =
    Arc<dyn Fn(&dyn Block, &ViewContext) -> Result<Fragment, BlockError> + Send + Sync>;

/// Rendered output of a view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub content: String,
}

impl Fragment {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A named view with its capability tags
pub struct View {
    name: String,
    handler: ViewHandler,
    functionalities: BTreeSet<String>,
}

impl View {
    pub(crate) fn new(name: String, handler: ViewHandler, functionalities: BTreeSet<String>) -> Self {
        Self {
            name,
            handler,
            functionalities,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared capability tags
    pub fn functionalities(&self) -> &BTreeSet<String> {
        &self.functionalities
    }

    /// Invoke the view on `block`
    pub fn call(&self, block: &dyn Block, context: &ViewContext) -> Result<Fragment, BlockError> {
        (self.handler)(block, context)
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("functionalities", &self.functionalities)
            .finish()
    }
}

/// View lookup, dispatch and capability queries
pub trait ViewsMixin {
    /// Whether `view` supports `functionality`
    ///
    /// The default answers from the view's tags: false when either side is
    /// absent or the tag is missing. Override to apply another policy.
    fn has_support(&self, view: Option<&View>, functionality: Option<&str>) -> bool {
        match (view, functionality) {
            (Some(view), Some(functionality)) => view.functionalities.contains(functionality),
            _ => false,
        }
    }

    /// Look up a view by name
    fn view(&self, name: &str) -> Option<Arc<View>>
    where
        Self: Block,
    {
        self.instance().block_type().view(name).cloned()
    }

    /// Render the named view
    fn render(&self, view_name: &str, context: &ViewContext) -> Result<Fragment, BlockError>
    where
        Self: Block + Sized,
    {
        let view = self
            .view(view_name)
            .ok_or_else(|| BlockError::NoSuchView(view_name.to_string()))?;
        view.call(self, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagless;
    impl ViewsMixin for Tagless {}

    fn view(tags: &[&str]) -> View {
        View::new(
            "student_view".into(),
            Arc::new(|_: &dyn Block, _: &ViewContext| Ok::<_, BlockError>(Fragment::default())),
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[test]
    fn test_default_has_support() {
        let block = Tagless;
        let tagged = view(&["multi_device"]);

        assert!(block.has_support(Some(&tagged), Some("multi_device")));
        assert!(!block.has_support(Some(&tagged), Some("bogus")));
        assert!(!block.has_support(Some(&tagged), None));
        assert!(!block.has_support(None, Some("multi_device")));
    }

    #[test]
    fn test_untagged_view_supports_nothing() {
        let block = Tagless;
        let untagged = view(&[]);
        for functionality in [Some("multi_device"), Some(""), None] {
            assert!(!block.has_support(Some(&untagged), functionality));
        }
    }
}
