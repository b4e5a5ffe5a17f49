//! Path-addressed form state: values, field metadata and validation.
//!
//! `tirea-form` keeps the values of a form in one JSON tree owned by a
//! [`Form`], and hands out [`Field`]s that read and write that tree at a
//! [`Path`]. Fields never copy data; every field addressing the same path
//! sees the same node.
//!
//! # Core Concepts
//!
//! - **Form**: owns the values tree and the per-field [`FieldMeta`]
//! - **Field**: a weak, path-scoped view with value, array and meta operations
//! - **Op**: one mutation of the values tree, applied atomically
//! - **Validator**: turns a value into an optional error message, sync or async
//!
//! # Quick Start
//!
//! ```
//! use tirea_form::{Field, FieldOptions, Form, FormOptions, SetValueOptions, Validator};
//! use serde_json::json;
//!
//! let form = Form::new(FormOptions::new().with_default_values(json!({"name": "test"})));
//!
//! let mut field = Field::new(
//!     &form,
//!     FieldOptions::new("name").with_on_change(Validator::new(|value| {
//!         (value == "other").then(|| "Please enter a different value".to_string())
//!     })),
//! );
//! field.mount();
//!
//! field.set_value("other", SetValueOptions::touched()).unwrap();
//! assert_eq!(field.get_value(), Some(json!("other")));
//! assert_eq!(field.get_meta().error.as_deref(), Some("Please enter a different value"));
//! assert!(field.get_meta().is_touched);
//! ```
//!
//! # Metadata never fails
//!
//! A path that has no stored metadata reads as the default
//! `{is_touched: false, is_validating: false, error: None}`, seeded by the
//! field's `default_meta`. This keeps fields created against an earlier
//! configuration safe to use after [`Form::update`].

mod error;
mod field;
mod form;
mod meta;
mod op;
mod path;
mod resolve;
mod validate;

pub use error::{value_type_name, BoxError, FormError, FormResult};
pub use field::{Field, FieldOptions, SetValueOptions};
pub use form::{Form, FormEvent, FormOptions, FormState};
pub use meta::{FieldMeta, MetaPatch, MetaStore};
pub use op::Op;
pub use path::{parse_path, Path, Seg};
pub use resolve::{apply_op, get_at_path};
pub use validate::{
    AsyncValidator, SyncValidator, ValidationResult, ValidationTrigger, Validator,
};

// Re-export serde_json::Value for convenience
pub use serde_json::Value;
