//! Field declarations
//!
//! A [`Field`] describes one named, typed, scoped attribute of a block type:
//! where its value is stored, what it defaults to, and whether it is always
//! exported. Fields are declared on a
//! [`BlockTypeBuilder`](super::block_type::BlockTypeBuilder), which binds the
//! field's name once, at type build time.

use std::fmt;
use std::sync::Arc;

use super::block::{BlockError, BlockInstance};
use super::scope::Scope;
use super::storage::{StorageError, StorageKey};
use super::value::FieldValue;

/// Value type of a field, used for coercion and string conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Any value, stored as-is
    Any,
    Boolean,
    Integer,
    Float,
    String,
    List,
    Dict,
}

impl FieldType {
    /// Coerce `value` to this type
    ///
    /// `Null` is accepted by every type.
    pub fn enforce(&self, value: FieldValue) -> Result<FieldValue, FieldError> {
        let mismatch = |value: &FieldValue| FieldError::TypeMismatch {
            expected: *self,
            found: value.kind().to_string(),
        };

        match (self, value) {
            (_, FieldValue::Null) => Ok(FieldValue::Null),
            (FieldType::Any, value) => Ok(value),

            (FieldType::Boolean, FieldValue::Boolean(b)) => Ok(FieldValue::Boolean(b)),
            (FieldType::Boolean, FieldValue::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(FieldValue::Boolean(true)),
                "false" => Ok(FieldValue::Boolean(false)),
                _ => Err(mismatch(&FieldValue::String(s))),
            },

            (FieldType::Integer, FieldValue::Integer(i)) => Ok(FieldValue::Integer(i)),
            (FieldType::Integer, FieldValue::Float(n))
                if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 =>
            {
                Ok(FieldValue::Integer(n as i64))
            }
            (FieldType::Integer, FieldValue::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| mismatch(&FieldValue::String(s))),

            (FieldType::Float, FieldValue::Float(n)) => Ok(FieldValue::Float(n)),
            (FieldType::Float, FieldValue::Integer(i)) => Ok(FieldValue::Float(i as f64)),
            (FieldType::Float, FieldValue::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| mismatch(&FieldValue::String(s))),

            (FieldType::String, FieldValue::String(s)) => Ok(FieldValue::String(s)),
            (FieldType::List, FieldValue::List(items)) => Ok(FieldValue::List(items)),
            (FieldType::Dict, FieldValue::Dict(map)) => Ok(FieldValue::Dict(map)),

            (_, other) => Err(mismatch(&other)),
        }
    }

    /// Serialize a value for export
    ///
    /// String fields export their text verbatim; everything else is JSON.
    /// A `Null` held by a String field exports as the text `null`, which
    /// imports back as the string `"null"`.
    pub fn to_string(&self, value: &FieldValue) -> Result<String, FieldError> {
        match (self, value) {
            (FieldType::String, FieldValue::String(s)) => Ok(s.clone()),
            _ => value
                .to_json_string()
                .map_err(|e| FieldError::Conversion(e.to_string())),
        }
    }

    /// Parse an exported string back into a value
    pub fn from_string(&self, text: &str) -> Result<FieldValue, FieldError> {
        match self {
            FieldType::String => Ok(FieldValue::String(text.to_string())),
            _ => {
                let value = FieldValue::from_json_str(text)
                    .map_err(|e| FieldError::Conversion(e.to_string()))?;
                self.enforce(value)
            }
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Any => "any",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::List => "list",
            FieldType::Dict => "dict",
        };
        write!(f, "{}", name)
    }
}

/// Zero-argument default producer
pub type DefaultProducer = Arc<dyn Fn() -> FieldValue + Send + Sync>;

/// What a field reads as when nothing is stored
#[derive(Clone, Default)]
pub enum FieldDefault {
    /// No default; unset reads surface the backend's not-found error
    #[default]
    None,
    /// A fixed value
    Static(FieldValue),
    /// A fresh unique identifier generated by the runtime
    UniqueId,
    /// Computed on every unset read
    Computed(DefaultProducer),
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::None => write!(f, "None"),
            FieldDefault::Static(value) => f.debug_tuple("Static").field(value).finish(),
            FieldDefault::UniqueId => write!(f, "UniqueId"),
            FieldDefault::Computed(_) => write!(f, "Computed(..)"),
        }
    }
}

/// Field declaration and value conversion errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("Expected {expected} value, found {found}")]
    TypeMismatch { expected: FieldType, found: String },

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Field has no name; declare it on a block type first")]
    Unbound,
}

/// A declared block attribute
#[derive(Debug, Clone)]
pub struct Field {
    name: Option<String>,
    field_type: FieldType,
    scope: Scope,
    default: FieldDefault,
    force_export: bool,
    display_name: Option<String>,
    help: Option<String>,
}

impl Field {
    /// Create a field of `field_type` in the content scope
    pub fn new(field_type: FieldType) -> Self {
        Self {
            name: None,
            field_type,
            scope: Scope::CONTENT,
            default: FieldDefault::None,
            force_export: false,
            display_name: None,
            help: None,
        }
    }

    pub fn any() -> Self {
        Self::new(FieldType::Any)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn list() -> Self {
        Self::new(FieldType::List)
    }

    pub fn dict() -> Self {
        Self::new(FieldType::Dict)
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set a static default
    pub fn default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = FieldDefault::Static(value.into());
        self
    }

    /// Default to a runtime-generated unique id
    pub fn unique_id_default(mut self) -> Self {
        self.default = FieldDefault::UniqueId;
        self
    }

    /// Default to the result of `producer`, evaluated on each unset read
    pub fn computed_default<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> FieldValue + Send + Sync + 'static,
    {
        self.default = FieldDefault::Computed(Arc::new(producer));
        self
    }

    /// Always export this field, even when unset
    pub fn force_export(mut self, force: bool) -> Self {
        self.force_export = force;
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Bind the declared name; done once by the type builder
    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// The declared name, once bound
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn storage_scope(&self) -> Scope {
        self.scope
    }

    pub fn default_policy(&self) -> &FieldDefault {
        &self.default
    }

    pub fn is_force_export(&self) -> bool {
        self.force_export
    }

    /// Human-readable label, falling back to the field name
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Storage key of this field on `block`
    pub fn key_for(&self, block: &BlockInstance) -> Result<StorageKey, FieldError> {
        let name = self.name.as_deref().ok_or(FieldError::Unbound)?;
        Ok(StorageKey::new(self.scope, block.scope_ids().clone(), name))
    }

    /// Whether `block`'s storage holds an explicit value for this field
    pub fn is_set_on(&self, block: &BlockInstance) -> Result<bool, BlockError> {
        let key = self.key_for(block)?;
        Ok(block.field_data().has(&key)?)
    }

    /// Current value on `block`, falling back to defaults when unset
    pub fn read_from(&self, block: &BlockInstance) -> Result<FieldValue, BlockError> {
        let key = self.key_for(block)?;
        match block.field_data().get(&key) {
            Ok(value) => Ok(value),
            Err(StorageError::NotFound(_)) => self.default_for(block, &key),
            Err(e) => Err(e.into()),
        }
    }

    /// Coerce and store `value` on `block`
    pub fn write_to(&self, block: &BlockInstance, value: FieldValue) -> Result<(), BlockError> {
        let key = self.key_for(block)?;
        let value = self.field_type.enforce(value)?;
        block.field_data().set(&key, value)?;
        Ok(())
    }

    /// Remove the stored value from `block`
    pub fn delete_from(&self, block: &BlockInstance) -> Result<(), BlockError> {
        let key = self.key_for(block)?;
        block.field_data().delete(&key)?;
        Ok(())
    }

    /// Serialize a value using this field's type
    pub fn to_string(&self, value: &FieldValue) -> Result<String, FieldError> {
        self.field_type.to_string(value)
    }

    /// Parse a serialized value using this field's type
    pub fn from_string(&self, text: &str) -> Result<FieldValue, FieldError> {
        self.field_type.from_string(text)
    }

    fn default_for(&self, block: &BlockInstance, key: &StorageKey) -> Result<FieldValue, BlockError> {
        if let Some(value) = block.field_data().default_value(key)? {
            return Ok(value);
        }

        match &self.default {
            FieldDefault::Static(value) => Ok(value.clone()),
            FieldDefault::Computed(producer) => Ok(producer()),
            FieldDefault::UniqueId => Ok(FieldValue::String(block.unique_id_for(&key.field_name))),
            FieldDefault::None => Err(StorageError::NotFound(key.clone()).into()),
        }
    }
}
