//! The form: sole owner of a values tree and its field metadata.
//!
//! `Form` is a cheap handle; clones share the same state. Fields keep only a
//! weak reference to that state, so a form is dropped together with its last
//! `Form` handle no matter how many fields still point at it.

use crate::field::FieldRegistration;
use crate::resolve::{apply_op, get_at_path};
use crate::validate::{run_inline, ValidationTrigger};
use crate::{FieldMeta, FormResult, MetaPatch, MetaStore, Op, Path};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Form configuration.
///
/// Deserializes from the same camelCase shape a host would pass in, e.g.
/// `{"defaultValues": {"name": "test"}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormOptions {
    /// Initial values tree. Defaults to an empty object.
    pub default_values: Value,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            default_values: Value::Object(Map::new()),
        }
    }
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_values(mut self, values: impl Into<Value>) -> Self {
        self.default_values = values.into();
        self
    }
}

/// Change notification delivered to [`Form::subscribe`] receivers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormEvent {
    /// An operation was applied to the values tree.
    ValueChanged { op: Op },
    /// A field's metadata changed.
    MetaChanged { path: Path, meta: FieldMeta },
    /// Options were replaced through [`Form::update`].
    Updated,
    /// Values and metadata were reset.
    Reset,
}

/// Aggregate status over every field with stored metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormState {
    pub is_touched: bool,
    pub is_validating: bool,
    pub is_valid: bool,
    /// Current error message per field path.
    pub errors: BTreeMap<Path, String>,
}

impl FormState {
    fn collect(store: &MetaStore) -> Self {
        let mut state = FormState {
            is_touched: false,
            is_validating: false,
            is_valid: true,
            errors: BTreeMap::new(),
        };
        for (path, meta) in store.iter() {
            state.is_touched |= meta.is_touched;
            state.is_validating |= meta.is_validating;
            if let Some(error) = &meta.error {
                state.errors.insert(path.clone(), error.clone());
            }
        }
        state.is_valid = state.errors.is_empty();
        state
    }
}

/// Shared state behind a [`Form`] handle.
pub(crate) struct FormInner {
    options: Mutex<FormOptions>,
    values: Mutex<Value>,
    meta: Mutex<MetaStore>,
    /// Mounted fields keyed by an id handed out at mount, so in mount order.
    fields: Mutex<BTreeMap<u64, FieldRegistration>>,
    next_field_id: AtomicU64,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<FormEvent>>>,
}

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Reads of form state must never fail, so poisoning is not an error here.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FormInner {
    fn new(options: FormOptions) -> Self {
        Self {
            values: Mutex::new(options.default_values.clone()),
            options: Mutex::new(options),
            meta: Mutex::new(MetaStore::new()),
            fields: Mutex::new(BTreeMap::new()),
            next_field_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn get_value(&self, path: &Path) -> Option<Value> {
        get_at_path(&lock(&self.values), path).cloned()
    }

    pub(crate) fn apply(&self, op: Op) -> FormResult<()> {
        apply_op(&mut lock(&self.values), &op)?;
        tracing::debug!(op = op.name(), path = %op.path(), "form value changed");
        self.emit(FormEvent::ValueChanged { op });
        Ok(())
    }

    pub(crate) fn meta(&self, path: &Path, seed: Option<&MetaPatch>) -> FieldMeta {
        lock(&self.meta).get(path, seed)
    }

    /// Read metadata for `path`, storing `seed` as its entry if it has none.
    pub(crate) fn seeded_meta(&self, path: &Path, seed: Option<&MetaPatch>) -> FieldMeta {
        lock(&self.meta).get_or_seed(path, seed)
    }

    pub(crate) fn update_meta(
        &self,
        path: &Path,
        seed: Option<&MetaPatch>,
        patch: &MetaPatch,
    ) -> FieldMeta {
        let meta = lock(&self.meta).update(path, seed, patch);
        self.emit(FormEvent::MetaChanged {
            path: path.clone(),
            meta: meta.clone(),
        });
        meta
    }

    pub(crate) fn begin_validation(&self, path: &Path, seed: Option<&MetaPatch>) -> u64 {
        let (ticket, meta) = {
            let mut store = lock(&self.meta);
            let ticket = store.begin_validation(path, seed);
            (ticket, store.get(path, seed))
        };
        tracing::debug!(path = %path, ticket, "validation started");
        self.emit(FormEvent::MetaChanged {
            path: path.clone(),
            meta,
        });
        ticket
    }

    pub(crate) fn finish_validation(
        &self,
        path: &Path,
        seed: Option<&MetaPatch>,
        ticket: u64,
        outcome: Option<Option<String>>,
    ) {
        let settled = lock(&self.meta).finish_validation(path, seed, ticket, outcome);
        match settled {
            Some(meta) => {
                tracing::debug!(path = %path, ticket, error = ?meta.error, "validation settled");
                self.emit(FormEvent::MetaChanged {
                    path: path.clone(),
                    meta,
                });
            }
            None => tracing::debug!(path = %path, ticket, "superseded validation discarded"),
        }
    }

    pub(crate) fn next_field_id(&self) -> u64 {
        self.next_field_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register(&self, id: u64, registration: FieldRegistration) {
        tracing::trace!(id, path = %registration.path, "field mounted");
        lock(&self.fields).insert(id, registration);
    }

    pub(crate) fn unregister(&self, id: u64) {
        if let Some(registration) = lock(&self.fields).remove(&id) {
            tracing::trace!(id, path = %registration.path, "field unmounted");
        }
    }

    #[cfg(test)]
    pub(crate) fn mounted_paths(&self) -> Vec<Path> {
        lock(&self.fields)
            .values()
            .map(|registration| registration.path.clone())
            .collect()
    }

    fn emit(&self, event: FormEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Root container of a form's values and field metadata.
///
/// ```
/// use tirea_form::{path, Form, FormOptions};
/// use serde_json::json;
///
/// let form = Form::new(FormOptions::new().with_default_values(json!({"name": "test"})));
/// assert_eq!(form.get_field_value(&path!("name")), Some(json!("test")));
/// ```
#[derive(Clone)]
pub struct Form {
    pub(crate) inner: Arc<FormInner>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new(FormOptions::default())
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("values", &*lock(&self.inner.values))
            .field("fields", &lock(&self.inner.meta).len())
            .finish()
    }
}

impl Form {
    /// Create a form owning its own copy of `options.default_values`.
    pub fn new(options: FormOptions) -> Self {
        Self {
            inner: Arc::new(FormInner::new(options)),
        }
    }

    pub(crate) fn from_inner(inner: Arc<FormInner>) -> Self {
        Self { inner }
    }

    pub fn options(&self) -> FormOptions {
        lock(&self.inner.options).clone()
    }

    /// Snapshot of the whole values tree.
    pub fn values(&self) -> Value {
        lock(&self.inner.values).clone()
    }

    /// Value at `path`, `None` if nothing is there.
    pub fn get_field_value(&self, path: &Path) -> Option<Value> {
        self.inner.get_value(path)
    }

    /// Write `value` at `path`, creating intermediate containers.
    pub fn set_field_value(&self, path: &Path, value: impl Into<Value>) -> FormResult<()> {
        self.inner.apply(Op::set(path.clone(), value))
    }

    /// Apply one operation to the values tree. On error nothing changes.
    pub fn apply(&self, op: Op) -> FormResult<()> {
        self.inner.apply(op)
    }

    /// Remove the value at `path` together with all metadata at or below it.
    pub fn delete_field(&self, path: &Path) -> FormResult<()> {
        self.inner.apply(Op::delete(path.clone()))?;
        lock(&self.inner.meta).remove_subtree(path);
        Ok(())
    }

    /// Replace the form's options.
    ///
    /// New default values replace the current values. Field metadata is
    /// left alone; fields created against the old options keep reading
    /// defaults for paths that have no entry.
    pub fn update(&self, options: FormOptions) {
        let new_values = {
            let mut current = lock(&self.inner.options);
            let changed = current.default_values != options.default_values;
            *current = options;
            changed.then(|| current.default_values.clone())
        };
        if let Some(values) = new_values {
            *lock(&self.inner.values) = values;
        }
        tracing::debug!("form options updated");
        self.inner.emit(FormEvent::Updated);
    }

    /// Restore default values and drop all field metadata.
    ///
    /// Validations still in flight are discarded when they settle.
    pub fn reset(&self) {
        let defaults = lock(&self.inner.options).default_values.clone();
        *lock(&self.inner.values) = defaults;
        lock(&self.inner.meta).clear();
        tracing::debug!("form reset");
        self.inner.emit(FormEvent::Reset);
    }

    /// Metadata for `path`; defaults if none was ever stored.
    pub fn get_field_meta(&self, path: &Path) -> FieldMeta {
        self.inner.meta(path, None)
    }

    pub fn set_field_meta(&self, path: &Path, patch: &MetaPatch) -> FieldMeta {
        self.inner.update_meta(path, None, patch)
    }

    pub fn state(&self) -> FormState {
        FormState::collect(&lock(&self.inner.meta))
    }

    /// Run the `trigger` validator of every mounted field, one after the
    /// other in mount order, and return the resulting state.
    ///
    /// A validator that fails aborts the run with its error.
    pub async fn validate_all(&self, trigger: ValidationTrigger) -> FormResult<FormState> {
        let registrations: Vec<FieldRegistration> =
            lock(&self.inner.fields).values().cloned().collect();
        for registration in registrations {
            let Some(validator) = registration.validators.get(trigger) else {
                continue;
            };
            let value = self.inner.get_value(&registration.path).unwrap_or(Value::Null);
            run_inline(
                &self.inner,
                &registration.path,
                registration.default_meta.as_ref(),
                validator,
                value,
            )
            .await?;
        }
        Ok(self.state())
    }

    /// Receive every subsequent [`FormEvent`].
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<FormEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner.subscribers).push(tx);
        rx
    }

    /// Number of currently mounted fields.
    pub fn mounted_fields(&self) -> usize {
        lock(&self.inner.fields).len()
    }
}
