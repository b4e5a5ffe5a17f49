//! Fields: path-scoped views over a form.
//!
//! A `Field` owns no data. It holds a weak reference to its form plus the
//! path it addresses; every read and write goes through the form. Any number
//! of fields may address the same or overlapping paths.

use crate::error::{FormError, FormResult};
use crate::form::{Form, FormInner};
use crate::validate::{dispatch, ensure_runtime, run_inline, ValidationTrigger, Validator};
use crate::{FieldMeta, MetaPatch, Op, Path, Seg};
use serde_json::Value;
use std::sync::{Arc, Weak};

/// Construction options for a [`Field`].
#[derive(Clone, Debug)]
pub struct FieldOptions {
    /// Path the field addresses.
    pub name: Path,
    /// Seeds the field's metadata the first time it is read or written.
    pub default_meta: Option<MetaPatch>,
    /// Written on mount when nothing is stored at `name` yet.
    pub default_value: Option<Value>,
    pub on_change: Option<Validator>,
    pub on_blur: Option<Validator>,
}

impl FieldOptions {
    /// Options for the field at `name`, e.g. `"names[0].first"`.
    pub fn new(name: impl Into<Path>) -> Self {
        Self {
            name: name.into(),
            default_meta: None,
            default_value: None,
            on_change: None,
            on_blur: None,
        }
    }

    pub fn with_default_meta(mut self, meta: MetaPatch) -> Self {
        self.default_meta = Some(meta);
        self
    }

    pub fn with_default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_on_change(mut self, validator: Validator) -> Self {
        self.on_change = Some(validator);
        self
    }

    pub fn with_on_blur(mut self, validator: Validator) -> Self {
        self.on_blur = Some(validator);
        self
    }
}

/// Options for [`Field::set_value`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetValueOptions {
    /// Mark the field as touched along with the write.
    pub touch: bool,
}

impl SetValueOptions {
    pub fn touched() -> Self {
        Self { touch: true }
    }
}

/// A field's validators by trigger.
#[derive(Clone, Debug, Default)]
pub(crate) struct Validators {
    on_change: Option<Validator>,
    on_blur: Option<Validator>,
}

impl Validators {
    pub(crate) fn get(&self, trigger: ValidationTrigger) -> Option<&Validator> {
        match trigger {
            ValidationTrigger::Change => self.on_change.as_ref(),
            ValidationTrigger::Blur => self.on_blur.as_ref(),
        }
    }
}

/// What a mounted field leaves with its form so form-wide validation can
/// reach it.
#[derive(Clone, Debug)]
pub(crate) struct FieldRegistration {
    pub(crate) path: Path,
    pub(crate) default_meta: Option<MetaPatch>,
    pub(crate) validators: Validators,
}

/// Accessor and mutator for one path of a [`Form`].
///
/// ```
/// use tirea_form::{Field, FieldOptions, Form, FormOptions};
/// use serde_json::json;
///
/// let form = Form::new(FormOptions::new().with_default_values(json!({"names": ["one"]})));
/// let field = Field::new(&form, FieldOptions::new("names"));
/// field.push_value("other").unwrap();
/// assert_eq!(field.get_value(), Some(json!(["one", "other"])));
/// ```
#[derive(Debug)]
pub struct Field {
    form: Weak<FormInner>,
    path: Path,
    default_meta: Option<MetaPatch>,
    default_value: Option<Value>,
    validators: Validators,
    /// Registry key, set while mounted.
    mount_id: Option<u64>,
}

impl Field {
    /// Bind a new, unmounted field to `form`.
    pub fn new(form: &Form, options: FieldOptions) -> Self {
        Self {
            form: Arc::downgrade(&form.inner),
            path: options.name,
            default_meta: options.default_meta,
            default_value: options.default_value,
            validators: Validators {
                on_change: options.on_change,
                on_blur: options.on_blur,
            },
            mount_id: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_mounted(&self) -> bool {
        self.mount_id.is_some()
    }

    /// The owning form, unless it has been dropped.
    pub fn form(&self) -> Option<Form> {
        self.form.upgrade().map(Form::from_inner)
    }

    fn attached(&self) -> FormResult<Arc<FormInner>> {
        self.form
            .upgrade()
            .ok_or_else(|| FormError::detached(self.path.clone()))
    }

    fn seed(&self) -> Option<&MetaPatch> {
        self.default_meta.as_ref()
    }

    /// Validator for `trigger`, if the field is mounted and has one.
    fn active_validator(&self, trigger: ValidationTrigger) -> Option<&Validator> {
        self.mount_id?;
        self.validators.get(trigger)
    }

    /// Activate validation triggers.
    ///
    /// Idempotent and infallible. Stores `default_meta` for the field's path
    /// and writes `default_value`, each only if nothing is stored there yet.
    /// A default value that cannot be written is logged and skipped. Mounting
    /// a field whose form is gone does nothing.
    pub fn mount(&mut self) {
        if self.mount_id.is_some() {
            return;
        }
        let Some(form) = self.form.upgrade() else {
            tracing::debug!(path = %self.path, "ignoring mount of a detached field");
            return;
        };
        let id = form.next_field_id();
        form.register(
            id,
            FieldRegistration {
                path: self.path.clone(),
                default_meta: self.default_meta.clone(),
                validators: self.validators.clone(),
            },
        );
        self.mount_id = Some(id);
        form.seeded_meta(&self.path, self.seed());
        if let Some(default) = &self.default_value {
            if form.get_value(&self.path).is_none() {
                if let Err(err) = form.apply(Op::set(self.path.clone(), default.clone())) {
                    tracing::warn!(path = %self.path, error = %err, "could not seed default value");
                }
            }
        }
    }

    /// Deactivate validation triggers. Dropping the field does the same.
    pub fn unmount(&mut self) {
        let Some(id) = self.mount_id.take() else {
            return;
        };
        if let Some(form) = self.form.upgrade() {
            form.unregister(id);
        }
    }

    /// Current value, `None` if nothing is stored or the form is gone.
    pub fn get_value(&self) -> Option<Value> {
        self.form.upgrade()?.get_value(&self.path)
    }

    /// Write `value`, then run the change validator if the field is mounted.
    ///
    /// A sync validator has settled by the time this returns, so
    /// `get_meta().error` already reflects `value`. An async validator keeps
    /// `is_validating` set until it settles in the background.
    pub fn set_value(&self, value: impl Into<Value>, options: SetValueOptions) -> FormResult<()> {
        let form = self.attached()?;
        let value = value.into();
        let validator = self.active_validator(ValidationTrigger::Change);
        if let Some(validator) = validator {
            ensure_runtime(validator, &self.path)?;
        }

        form.apply(Op::set(self.path.clone(), value.clone()))?;
        if options.touch {
            form.update_meta(&self.path, self.seed(), &MetaPatch::new().with_touched(true));
        }
        match validator {
            Some(validator) => dispatch(&form, &self.path, self.seed(), validator, value),
            None => Ok(()),
        }
    }

    /// Derive the next value from the current one and write it as a user
    /// edit (touching the field).
    pub fn handle_change<F>(&self, updater: F) -> FormResult<()>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        let next = updater(self.get_value());
        self.set_value(next, SetValueOptions::touched())
    }

    /// Mark the field touched and run the blur validator if mounted.
    pub fn handle_blur(&self) -> FormResult<()> {
        let form = self.attached()?;
        let validator = self.active_validator(ValidationTrigger::Blur);
        if let Some(validator) = validator {
            ensure_runtime(validator, &self.path)?;
        }

        form.update_meta(&self.path, self.seed(), &MetaPatch::new().with_touched(true));
        match validator {
            Some(validator) => {
                let value = form.get_value(&self.path).unwrap_or(Value::Null);
                dispatch(&form, &self.path, self.seed(), validator, value)
            }
            None => Ok(()),
        }
    }

    /// Append to the sequence at this path, creating it if absent.
    pub fn push_value(&self, value: impl Into<Value>) -> FormResult<()> {
        self.attached()?.apply(Op::push(self.path.clone(), value))
    }

    /// Write `value` at `index` of the sequence at this path.
    ///
    /// The element already at `index` is replaced; `index == len` appends.
    /// For a shifting insert apply [`Op::Insert`] through the form.
    pub fn insert_value(&self, index: usize, value: impl Into<Value>) -> FormResult<()> {
        self.attached()?
            .apply(Op::replace(self.path.clone(), index, value))
    }

    pub fn remove_value(&self, index: usize) -> FormResult<()> {
        self.attached()?.apply(Op::remove(self.path.clone(), index))
    }

    pub fn swap_values(&self, a: usize, b: usize) -> FormResult<()> {
        self.attached()?.apply(Op::swap(self.path.clone(), a, b))
    }

    /// Current metadata. Never fails.
    ///
    /// The first read of a path with no stored metadata stores the field's
    /// `default_meta` there, so the form and other fields see it too.
    /// Without a form the seeded defaults are returned.
    pub fn get_meta(&self) -> FieldMeta {
        match self.form.upgrade() {
            Some(form) => form.seeded_meta(&self.path, self.seed()),
            None => FieldMeta::seeded(self.seed()),
        }
    }

    pub fn set_meta(&self, patch: &MetaPatch) -> FormResult<FieldMeta> {
        Ok(self.attached()?.update_meta(&self.path, self.seed(), patch))
    }

    /// A new field addressing `sub` under this one, on the same form.
    ///
    /// A string is parsed like a field name, so `"0"` addresses the first
    /// element of a sequence. The subfield starts unmounted and without
    /// validators or defaults.
    pub fn get_sub_field(&self, sub: impl Into<Seg>) -> Field {
        Field {
            form: self.form.clone(),
            path: self.path.join(sub),
            default_meta: None,
            default_value: None,
            validators: Validators::default(),
            mount_id: None,
        }
    }

    /// Run the `trigger` validator now, mounted or not, and wait for it.
    ///
    /// Returns the validator's message; `Ok(None)` when it reports nothing or
    /// the field has no validator for `trigger`.
    pub async fn validate(&self, trigger: ValidationTrigger) -> FormResult<Option<String>> {
        let form = self.attached()?;
        let Some(validator) = self.validators.get(trigger) else {
            return Ok(None);
        };
        let value = form.get_value(&self.path).unwrap_or(Value::Null);
        run_inline(&form, &self.path, self.seed(), validator, value).await
    }
}

impl Drop for Field {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{path, FormOptions};
    use serde_json::json;

    fn form_with(values: Value) -> Form {
        Form::new(FormOptions::new().with_default_values(values))
    }

    #[test]
    fn test_field_name_parsing() {
        let form = form_with(json!({"names": [{"first": "one"}]}));
        let field = Field::new(&form, FieldOptions::new("names[0].first"));
        assert_eq!(field.path(), &path!("names", 0, "first"));
        assert_eq!(field.get_value(), Some(json!("one")));
    }

    #[test]
    fn test_mount_is_idempotent() {
        let form = Form::default();
        let mut field = Field::new(&form, FieldOptions::new("name"));
        field.mount();
        field.mount();
        assert!(field.is_mounted());
        assert_eq!(form.mounted_fields(), 1);

        field.unmount();
        assert!(!field.is_mounted());
        assert_eq!(form.mounted_fields(), 0);
    }

    #[test]
    fn test_drop_unregisters() {
        let form = Form::default();
        let mut field = Field::new(&form, FieldOptions::new("name"));
        field.mount();
        drop(field);
        assert_eq!(form.mounted_fields(), 0);
    }

    #[test]
    fn test_mount_seeds_default_value_only_when_absent() {
        let form = form_with(json!({"kept": 1}));
        let mut kept = Field::new(&form, FieldOptions::new("kept").with_default_value(9));
        let mut seeded = Field::new(&form, FieldOptions::new("seeded").with_default_value("x"));
        kept.mount();
        seeded.mount();
        assert_eq!(form.values(), json!({"kept": 1, "seeded": "x"}));
    }

    #[test]
    fn test_mount_with_unwritable_default_does_not_fail() {
        let form = form_with(json!({"name": "test"}));
        let mut field = Field::new(
            &form,
            FieldOptions::new("name.first").with_default_value("x"),
        );
        field.mount();
        assert!(field.is_mounted());
        assert_eq!(form.values(), json!({"name": "test"}));
    }

    #[test]
    fn test_detached_field() {
        let form = form_with(json!({"name": "test"}));
        let mut field = Field::new(
            &form,
            FieldOptions::new("name").with_default_meta(MetaPatch::new().with_touched(true)),
        );
        drop(form);

        field.mount();
        assert!(field.form().is_none());
        assert_eq!(field.get_value(), None);
        assert!(field.get_meta().is_touched);
        assert!(matches!(
            field.set_value("x", SetValueOptions::default()),
            Err(FormError::Detached { .. })
        ));
        assert!(matches!(
            field.push_value("x"),
            Err(FormError::Detached { .. })
        ));
    }

    #[test]
    fn test_unmounted_field_skips_validation() {
        let form = Form::default();
        let field = Field::new(
            &form,
            FieldOptions::new("name").with_on_change(Validator::new(|_| Some("bad".into()))),
        );
        field.set_value("x", SetValueOptions::default()).unwrap();
        assert_eq!(field.get_meta().error, None);
    }

    #[test]
    fn test_handle_change_touches() {
        let form = form_with(json!({"count": 1}));
        let field = Field::new(&form, FieldOptions::new("count"));
        field
            .handle_change(|current| json!(current.and_then(|v| v.as_i64()).unwrap_or(0) + 1))
            .unwrap();
        assert_eq!(field.get_value(), Some(json!(2)));
        assert!(field.get_meta().is_touched);
    }

    #[test]
    fn test_handle_blur_runs_blur_validator() {
        let form = form_with(json!({"name": ""}));
        let mut field = Field::new(
            &form,
            FieldOptions::new("name").with_on_blur(Validator::new(|value| {
                (value == "").then(|| "Required".to_string())
            })),
        );
        field.mount();
        field.handle_blur().unwrap();

        let meta = field.get_meta();
        assert!(meta.is_touched);
        assert!(!meta.is_validating);
        assert_eq!(meta.error.as_deref(), Some("Required"));
    }

    #[test]
    fn test_set_meta_uses_seed() {
        let form = Form::default();
        let field = Field::new(
            &form,
            FieldOptions::new("name").with_default_meta(MetaPatch::new().with_touched(true)),
        );
        let meta = field
            .set_meta(&MetaPatch::new().with_error(Some("server said no")))
            .unwrap();
        assert!(meta.is_touched);
        assert_eq!(meta.error.as_deref(), Some("server said no"));
        assert_eq!(form.get_field_meta(&path!("name")), meta);
    }

    #[test]
    fn test_sub_field_name_is_parsed() {
        let form = form_with(json!({"names": [{"first": "one"}, {"first": "two"}]}));
        let field = Field::new(&form, FieldOptions::new("names"));

        assert_eq!(field.get_sub_field("0").path(), &path!("names", 0));
        assert_eq!(field.get_sub_field("1.first").get_value(), Some(json!("two")));
        assert_eq!(field.get_sub_field(0).get_sub_field("first").get_value(), Some(json!("one")));
    }

    #[test]
    fn test_remount_registers_after_later_fields() {
        let form = Form::default();
        let mut early = Field::new(&form, FieldOptions::new("early"));
        let mut late = Field::new(&form, FieldOptions::new("late"));
        early.mount();
        late.mount();
        early.unmount();
        early.mount();

        assert_eq!(form.inner.mounted_paths(), vec![path!("late"), path!("early")]);
    }

    #[test]
    fn test_subfield_does_not_touch_parent() {
        let form = form_with(json!({"names": {"first": "one"}}));
        let mut parent = Field::new(&form, FieldOptions::new("names"));
        parent.mount();
        let child = parent.get_sub_field("first");
        assert_eq!(parent.path(), &path!("names"));
        assert_eq!(child.path(), &path!("names", "first"));
        assert!(!child.is_mounted());
        assert_eq!(form.mounted_fields(), 1);
    }
}
