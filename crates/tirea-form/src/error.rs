//! Error types for form and field operations.
//!
//! Reads never produce these: a missing path reads as `None` and missing
//! metadata reads as defaults. Validation failures are not errors either;
//! they live in `FieldMeta::error`.

use crate::Path;
use serde_json::Value;
use thiserror::Error;

/// Boxed error returned by a failing validator callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for form operations.
pub type FormResult<T> = Result<T, FormError>;

/// Errors raised by mutations and validation dispatch.
#[derive(Debug, Error)]
pub enum FormError {
    /// The node at `path` is not the container kind the operation needs.
    #[error("invalid container at {path}: expected {expected}, found {found}")]
    InvalidContainerKind {
        path: Path,
        expected: &'static str,
        found: &'static str,
    },

    /// Sequence index outside the bounds allowed by the operation.
    #[error("index {index} out of range (len: {len}) at {path}")]
    IndexOutOfRange { path: Path, index: usize, len: usize },

    /// A validator callback failed instead of returning a message.
    #[error("validator for {path} failed: {source}")]
    Validator {
        path: Path,
        #[source]
        source: BoxError,
    },

    /// The field outlived the form it was bound to.
    #[error("field {path} is detached from its form")]
    Detached { path: Path },

    /// An async validator was triggered outside of a tokio runtime.
    #[error("async validator for {path} requires a tokio runtime")]
    NoRuntime { path: Path },
}

impl FormError {
    #[inline]
    pub fn invalid_container_kind(path: Path, expected: &'static str, found: &'static str) -> Self {
        FormError::InvalidContainerKind {
            path,
            expected,
            found,
        }
    }

    #[inline]
    pub fn index_out_of_range(path: Path, index: usize, len: usize) -> Self {
        FormError::IndexOutOfRange { path, index, len }
    }

    #[inline]
    pub fn validator(path: Path, source: BoxError) -> Self {
        FormError::Validator { path, source }
    }

    #[inline]
    pub fn detached(path: Path) -> Self {
        FormError::Detached { path }
    }

    #[inline]
    pub fn no_runtime(path: Path) -> Self {
        FormError::NoRuntime { path }
    }
}

/// Get the type name of a JSON value.
#[inline]
pub fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Like [`value_type_name`], with `"undefined"` for an absent node.
#[inline]
pub(crate) fn node_type_name(v: Option<&Value>) -> &'static str {
    v.map(value_type_name).unwrap_or("undefined")
}
