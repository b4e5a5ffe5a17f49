//! Per-field metadata.
//!
//! Lookups never fail: a path with no stored entry reads as the default
//! metadata, optionally seeded by the reading field's `default_meta`.

use crate::Path;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transient status of one field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMeta {
    pub is_touched: bool,
    pub is_validating: bool,
    /// Message from the last validator run, if it reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FieldMeta {
    /// Overwrite every key `patch` sets.
    pub fn apply(&mut self, patch: &MetaPatch) {
        if let Some(touched) = patch.is_touched {
            self.is_touched = touched;
        }
        if let Some(validating) = patch.is_validating {
            self.is_validating = validating;
        }
        if let Some(error) = &patch.error {
            self.error = error.clone();
        }
    }

    /// Default metadata with `seed` applied on top.
    pub fn seeded(seed: Option<&MetaPatch>) -> Self {
        let mut meta = Self::default();
        if let Some(seed) = seed {
            meta.apply(seed);
        }
        meta
    }
}

/// A partial [`FieldMeta`]; `None` leaves a key as it is.
///
/// `error: Some(None)` clears the error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaPatch {
    pub is_touched: Option<bool>,
    pub is_validating: Option<bool>,
    pub error: Option<Option<String>>,
}

impl MetaPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_touched(mut self, touched: bool) -> Self {
        self.is_touched = Some(touched);
        self
    }

    pub fn with_validating(mut self, validating: bool) -> Self {
        self.is_validating = Some(validating);
        self
    }

    pub fn with_error(mut self, error: Option<impl Into<String>>) -> Self {
        self.error = Some(error.map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.is_touched.is_none() && self.is_validating.is_none() && self.error.is_none()
    }
}

/// Metadata for every field path of a form, plus the bookkeeping that keeps
/// overlapping validations of one field from clobbering each other.
#[derive(Debug, Default)]
pub struct MetaStore {
    entries: HashMap<Path, FieldMeta>,
    /// Latest validation ticket per path; absent once it settles.
    in_flight: HashMap<Path, u64>,
    next_ticket: u64,
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored metadata for `path`, else the defaults seeded by `seed`.
    pub fn get(&self, path: &Path, seed: Option<&MetaPatch>) -> FieldMeta {
        match self.entries.get(path) {
            Some(meta) => meta.clone(),
            None => FieldMeta::seeded(seed),
        }
    }

    /// Like [`get`](Self::get), but a `seed` with no entry to apply to is
    /// stored as the entry, so every later read of `path` sees it.
    pub fn get_or_seed(&mut self, path: &Path, seed: Option<&MetaPatch>) -> FieldMeta {
        match seed {
            Some(seed) => self
                .entries
                .entry(path.clone())
                .or_insert_with(|| FieldMeta::seeded(Some(seed)))
                .clone(),
            None => self.get(path, None),
        }
    }

    /// Merge `patch` into the entry for `path`, creating it from `seed` first
    /// if absent. Returns the merged metadata.
    pub fn update(&mut self, path: &Path, seed: Option<&MetaPatch>, patch: &MetaPatch) -> FieldMeta {
        let meta = self
            .entries
            .entry(path.clone())
            .or_insert_with(|| FieldMeta::seeded(seed));
        meta.apply(patch);
        tracing::trace!(path = %path, ?meta, "field meta updated");
        meta.clone()
    }

    /// Drop metadata at `path` and below it.
    pub fn remove_subtree(&mut self, path: &Path) {
        self.entries.retain(|p, _| !p.starts_with(path));
        self.in_flight.retain(|p, _| !p.starts_with(path));
    }

    /// Drop all metadata. Validations still in flight will be discarded.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &FieldMeta)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark `path` as validating and hand out a ticket for the run.
    ///
    /// A newer ticket for the same path supersedes every older one.
    pub fn begin_validation(&mut self, path: &Path, seed: Option<&MetaPatch>) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight.insert(path.clone(), ticket);
        self.update(path, seed, &MetaPatch::new().with_validating(true));
        ticket
    }

    /// Settle the run identified by `ticket`.
    ///
    /// `outcome` is the validator's verdict, or `None` when it failed and the
    /// current error must be kept. Returns the new metadata, or `None` when the
    /// ticket was superseded and nothing was written.
    pub fn finish_validation(
        &mut self,
        path: &Path,
        seed: Option<&MetaPatch>,
        ticket: u64,
        outcome: Option<Option<String>>,
    ) -> Option<FieldMeta> {
        if self.in_flight.get(path) != Some(&ticket) {
            return None;
        }
        self.in_flight.remove(path);
        let patch = MetaPatch {
            is_validating: Some(false),
            error: outcome,
            ..MetaPatch::default()
        };
        Some(self.update(path, seed, &patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn test_missing_entry_reads_defaults() {
        let store = MetaStore::new();
        assert_eq!(store.get(&path!("name"), None), FieldMeta::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_seed_applies_only_without_entry() {
        let mut store = MetaStore::new();
        let seed = MetaPatch::new().with_touched(true);
        assert!(store.get(&path!("name"), Some(&seed)).is_touched);

        store.update(&path!("name"), None, &MetaPatch::new().with_error(Some("bad")));
        let meta = store.get(&path!("name"), Some(&seed));
        assert!(!meta.is_touched);
        assert_eq!(meta.error.as_deref(), Some("bad"));
    }

    #[test]
    fn test_get_or_seed_stores_seed_once() {
        let mut store = MetaStore::new();
        let touched = MetaPatch::new().with_touched(true);

        assert!(store.get_or_seed(&path!("name"), Some(&touched)).is_touched);
        assert!(store.get(&path!("name"), None).is_touched);

        let other = MetaPatch::new().with_error(Some("ignored"));
        assert_eq!(store.get_or_seed(&path!("name"), Some(&other)).error, None);

        assert_eq!(store.get_or_seed(&path!("plain"), None), FieldMeta::default());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_creates_entry_from_seed() {
        let mut store = MetaStore::new();
        let seed = MetaPatch::new().with_touched(true);
        let meta = store.update(
            &path!("name"),
            Some(&seed),
            &MetaPatch::new().with_error(Some("required")),
        );
        assert!(meta.is_touched);
        assert_eq!(meta.error.as_deref(), Some("required"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_error() {
        let mut store = MetaStore::new();
        store.update(&path!("a"), None, &MetaPatch::new().with_error(Some("bad")));
        store.update(&path!("a"), None, &MetaPatch::new().with_error(None::<String>));
        assert_eq!(store.get(&path!("a"), None).error, None);
    }

    #[test]
    fn test_superseded_ticket_is_discarded() {
        let mut store = MetaStore::new();
        let first = store.begin_validation(&path!("a"), None);
        let second = store.begin_validation(&path!("a"), None);

        let early = store.finish_validation(&path!("a"), None, second, Some(Some("new".into())));
        assert_eq!(early.unwrap().error.as_deref(), Some("new"));

        let late = store.finish_validation(&path!("a"), None, first, Some(Some("old".into())));
        assert!(late.is_none());

        let meta = store.get(&path!("a"), None);
        assert!(!meta.is_validating);
        assert_eq!(meta.error.as_deref(), Some("new"));
    }

    #[test]
    fn test_failed_run_keeps_error() {
        let mut store = MetaStore::new();
        store.update(&path!("a"), None, &MetaPatch::new().with_error(Some("bad")));
        let ticket = store.begin_validation(&path!("a"), None);
        assert!(store.get(&path!("a"), None).is_validating);

        let meta = store.finish_validation(&path!("a"), None, ticket, None).unwrap();
        assert!(!meta.is_validating);
        assert_eq!(meta.error.as_deref(), Some("bad"));
    }

    #[test]
    fn test_clear_discards_in_flight() {
        let mut store = MetaStore::new();
        let ticket = store.begin_validation(&path!("a"), None);
        store.clear();
        assert!(store.finish_validation(&path!("a"), None, ticket, Some(None)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_subtree() {
        let mut store = MetaStore::new();
        let touched = MetaPatch::new().with_touched(true);
        store.update(&path!("names"), None, &touched);
        store.update(&path!("names", 0), None, &touched);
        store.update(&path!("other"), None, &touched);
        store.remove_subtree(&path!("names"));
        assert_eq!(store.len(), 1);
        assert!(store.get(&path!("other"), None).is_touched);
    }

    #[test]
    fn test_meta_serializes_like_the_wire_shape() {
        let meta = FieldMeta::default();
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            json!({"isTouched": false, "isValidating": false})
        );
        let meta = FieldMeta {
            error: Some("bad".into()),
            ..FieldMeta::default()
        };
        assert_eq!(serde_json::to_value(&meta).unwrap()["error"], "bad");
    }
}
