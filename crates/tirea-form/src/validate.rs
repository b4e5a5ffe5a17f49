//! Field validators and the pipeline that runs them.
//!
//! A validator turns a value into an optional error message. The pipeline
//! brackets every run with `is_validating` and writes the verdict into the
//! field's metadata. Each run takes a ticket from the meta store; only the
//! latest run of a field may settle it, so overlapping async validations
//! resolve to the result of the most recent invocation.

use crate::error::{BoxError, FormError, FormResult};
use crate::form::FormInner;
use crate::{MetaPatch, Path};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

/// What a validator produces: `Ok(None)` for valid, `Ok(Some(msg))` for a
/// validation error, `Err` when the validator itself broke.
pub type ValidationResult = Result<Option<String>, BoxError>;

/// Event that causes a field's validator to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationTrigger {
    Change,
    Blur,
}

/// Validator that answers immediately.
pub trait SyncValidator: Send + Sync {
    fn validate(&self, value: &Value) -> ValidationResult;
}

impl<F> SyncValidator for F
where
    F: Fn(&Value) -> ValidationResult + Send + Sync,
{
    fn validate(&self, value: &Value) -> ValidationResult {
        self(value)
    }
}

/// Validator that has to wait for something, e.g. a uniqueness lookup.
#[async_trait]
pub trait AsyncValidator: Send + Sync {
    async fn validate(&self, value: Value) -> ValidationResult;
}

struct AsyncFn<F>(F);

#[async_trait]
impl<F, Fut> AsyncValidator for AsyncFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ValidationResult> + Send + 'static,
{
    async fn validate(&self, value: Value) -> ValidationResult {
        (self.0)(value).await
    }
}

/// A field validator, sync or async.
#[derive(Clone)]
pub enum Validator {
    Sync(Arc<dyn SyncValidator>),
    Async(Arc<dyn AsyncValidator>),
}

impl Validator {
    /// Wrap an infallible closure.
    ///
    /// ```
    /// use tirea_form::Validator;
    ///
    /// let required = Validator::new(|value| {
    ///     value.is_null().then(|| "Required".to_string())
    /// });
    /// assert!(!required.is_async());
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        Validator::Sync(Arc::new(move |value: &Value| -> ValidationResult {
            Ok(f(value))
        }))
    }

    /// Wrap a closure that can fail on its own.
    pub fn fallible<F, E>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Option<String>, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Validator::Sync(Arc::new(move |value: &Value| -> ValidationResult {
            f(value).map_err(Into::into)
        }))
    }

    pub fn from_async<V>(validator: V) -> Self
    where
        V: AsyncValidator + 'static,
    {
        Validator::Async(Arc::new(validator))
    }

    /// Wrap a closure returning a future.
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ValidationResult> + Send + 'static,
    {
        Validator::Async(Arc::new(AsyncFn(f)))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Validator::Async(_))
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Sync(_) => f.write_str("Validator::Sync"),
            Validator::Async(_) => f.write_str("Validator::Async"),
        }
    }
}

/// Fail early when `validator` could not be dispatched from here.
pub(crate) fn ensure_runtime(validator: &Validator, path: &Path) -> FormResult<()> {
    if validator.is_async() && Handle::try_current().is_err() {
        return Err(FormError::no_runtime(path.clone()));
    }
    Ok(())
}

/// Start `validator` from a synchronous call site.
///
/// Sync validators settle before this returns and their failure is returned.
/// Async validators are spawned on the current runtime; the field stays
/// `is_validating` until they settle and a failure is only logged.
pub(crate) fn dispatch(
    form: &Arc<FormInner>,
    path: &Path,
    seed: Option<&MetaPatch>,
    validator: &Validator,
    value: Value,
) -> FormResult<()> {
    match validator {
        Validator::Sync(validator) => {
            let ticket = form.begin_validation(path, seed);
            settle(form, path, seed, ticket, validator.validate(&value)).map(|_| ())
        }
        Validator::Async(validator) => {
            let handle = Handle::try_current().map_err(|_| FormError::no_runtime(path.clone()))?;
            let ticket = form.begin_validation(path, seed);
            let form = Arc::downgrade(form);
            let validator = Arc::clone(validator);
            let path = path.clone();
            let seed = seed.cloned();
            handle.spawn(async move {
                let result = validator.validate(value).await;
                let Some(form) = form.upgrade() else {
                    tracing::debug!(path = %path, "form dropped before validation settled");
                    return;
                };
                if let Err(err) = settle(&form, &path, seed.as_ref(), ticket, result) {
                    tracing::warn!(path = %path, error = %err, "async validator failed");
                }
            });
            Ok(())
        }
    }
}

/// Run `validator` to completion and return its verdict.
pub(crate) async fn run_inline(
    form: &Arc<FormInner>,
    path: &Path,
    seed: Option<&MetaPatch>,
    validator: &Validator,
    value: Value,
) -> FormResult<Option<String>> {
    let ticket = form.begin_validation(path, seed);
    let result = match validator {
        Validator::Sync(validator) => validator.validate(&value),
        Validator::Async(validator) => validator.validate(value).await,
    };
    settle(form, path, seed, ticket, result)
}

fn settle(
    form: &FormInner,
    path: &Path,
    seed: Option<&MetaPatch>,
    ticket: u64,
    result: ValidationResult,
) -> FormResult<Option<String>> {
    match result {
        Ok(outcome) => {
            form.finish_validation(path, seed, ticket, Some(outcome.clone()));
            Ok(outcome)
        }
        Err(source) => {
            form.finish_validation(path, seed, ticket, None);
            Err(FormError::validator(path.clone(), source))
        }
    }
}
