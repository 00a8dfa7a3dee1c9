//! Storage scopes
//!
//! A [`Scope`] partitions field storage independently of the field name. It
//! combines a [`UserScope`] (whose value is it) with a [`BlockScope`] (which
//! blocks share it). [`ScopeIds`] carries the concrete identifiers a runtime
//! hands to each block instance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a field value relates to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UserScope {
    /// Shared by every user
    None,
    /// One value per user
    One,
    /// Aggregated across all users
    All,
}

/// How a field value relates to blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockScope {
    /// One value per usage of a definition
    Usage,
    /// One value per definition, shared by its usages
    Definition,
    /// One value per block type
    Type,
    /// One value for every block
    All,
}

/// A named storage partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Scope {
    pub user: UserScope,
    pub block: BlockScope,
    name: &'static str,
}

impl Scope {
    pub const CONTENT: Scope = Scope::new(UserScope::None, BlockScope::Definition, "content");
    pub const SETTINGS: Scope = Scope::new(UserScope::None, BlockScope::Usage, "settings");
    pub const CHILDREN: Scope = Scope::new(UserScope::None, BlockScope::Definition, "children");
    pub const PARENT: Scope = Scope::new(UserScope::None, BlockScope::Usage, "parent");
    pub const USER_STATE: Scope = Scope::new(UserScope::One, BlockScope::Usage, "user_state");
    pub const PREFERENCES: Scope = Scope::new(UserScope::One, BlockScope::Type, "preferences");
    pub const USER_INFO: Scope = Scope::new(UserScope::One, BlockScope::All, "user_info");
    pub const USER_STATE_SUMMARY: Scope =
        Scope::new(UserScope::All, BlockScope::Usage, "user_state_summary");

    /// Create a scope with an explicit name
    pub const fn new(user: UserScope, block: BlockScope, name: &'static str) -> Self {
        Self { user, block, name }
    }

    /// The scope's name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All predefined scopes
    pub fn named_scopes() -> [Scope; 8] {
        [
            Scope::CONTENT,
            Scope::SETTINGS,
            Scope::CHILDREN,
            Scope::PARENT,
            Scope::USER_STATE,
            Scope::PREFERENCES,
            Scope::USER_INFO,
            Scope::USER_STATE_SUMMARY,
        ]
    }

    /// Look up a predefined scope by name
    pub fn from_name(name: &str) -> Option<Scope> {
        Self::named_scopes().into_iter().find(|s| s.name == name)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::CONTENT
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Identifiers locating one block instance
///
/// Supplied by the runtime when it constructs a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeIds {
    pub user_id: String,
    pub block_type: String,
    pub def_id: String,
    pub usage_id: String,
}

impl ScopeIds {
    pub fn new(
        user_id: impl Into<String>,
        block_type: impl Into<String>,
        def_id: impl Into<String>,
        usage_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            block_type: block_type.into(),
            def_id: def_id.into(),
            usage_id: usage_id.into(),
        }
    }

    /// The user identifier relevant to `scope`, if any
    pub fn user_id_for(&self, scope: &Scope) -> Option<&str> {
        match scope.user {
            UserScope::One => Some(&self.user_id),
            UserScope::None | UserScope::All => None,
        }
    }

    /// The block identifier relevant to `scope`, if any
    pub fn block_id_for(&self, scope: &Scope) -> Option<&str> {
        match scope.block {
            BlockScope::Usage => Some(&self.usage_id),
            BlockScope::Definition => Some(&self.def_id),
            BlockScope::Type => Some(&self.block_type),
            BlockScope::All => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_and_content_are_distinct() {
        assert_eq!(Scope::CHILDREN.user, Scope::CONTENT.user);
        assert_eq!(Scope::CHILDREN.block, Scope::CONTENT.block);
        assert_ne!(Scope::CHILDREN, Scope::CONTENT);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Scope::from_name("settings"), Some(Scope::SETTINGS));
        assert_eq!(Scope::from_name("user_state"), Some(Scope::USER_STATE));
        assert_eq!(Scope::from_name("bogus"), None);
    }

    #[test]
    fn test_scope_id_projection() {
        let ids = ScopeIds::new("alice", "problem", "def-1", "usage-1");

        assert_eq!(ids.user_id_for(&Scope::CONTENT), None);
        assert_eq!(ids.block_id_for(&Scope::CONTENT), Some("def-1"));

        assert_eq!(ids.user_id_for(&Scope::USER_STATE), Some("alice"));
        assert_eq!(ids.block_id_for(&Scope::USER_STATE), Some("usage-1"));

        assert_eq!(ids.block_id_for(&Scope::PREFERENCES), Some("problem"));
        assert_eq!(ids.block_id_for(&Scope::USER_INFO), None);
        assert_eq!(ids.user_id_for(&Scope::USER_STATE_SUMMARY), None);
    }
}
