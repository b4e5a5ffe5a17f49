//! Mutation operations over a form's values tree.
//!
//! Every write a field performs is expressed as one `Op`, applied by the
//! owning form and broadcast to subscribers in a `FormEvent`.

use crate::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Replace the node at `path`, creating intermediate containers.
    Set { path: Path, value: Value },

    /// Remove the node at `path`. No-op if absent.
    Delete { path: Path },

    /// Append to the sequence at `path`, creating it if absent.
    Push { path: Path, value: Value },

    /// Insert into the sequence at `path`, shifting later elements right.
    Insert {
        path: Path,
        index: usize,
        value: Value,
    },

    /// Write the element at `index` of the sequence at `path`.
    ///
    /// `index == len` appends.
    Replace {
        path: Path,
        index: usize,
        value: Value,
    },

    /// Remove the element at `index`, shifting later elements left.
    Remove { path: Path, index: usize },

    /// Exchange two elements of the sequence at `path`.
    Swap { path: Path, a: usize, b: usize },
}

impl Op {
    #[inline]
    pub fn set(path: Path, value: impl Into<Value>) -> Self {
        Op::Set {
            path,
            value: value.into(),
        }
    }

    #[inline]
    pub fn delete(path: Path) -> Self {
        Op::Delete { path }
    }

    #[inline]
    pub fn push(path: Path, value: impl Into<Value>) -> Self {
        Op::Push {
            path,
            value: value.into(),
        }
    }

    #[inline]
    pub fn insert(path: Path, index: usize, value: impl Into<Value>) -> Self {
        Op::Insert {
            path,
            index,
            value: value.into(),
        }
    }

    #[inline]
    pub fn replace(path: Path, index: usize, value: impl Into<Value>) -> Self {
        Op::Replace {
            path,
            index,
            value: value.into(),
        }
    }

    #[inline]
    pub fn remove(path: Path, index: usize) -> Self {
        Op::Remove { path, index }
    }

    #[inline]
    pub fn swap(path: Path, a: usize, b: usize) -> Self {
        Op::Swap { path, a, b }
    }

    /// Get the path this operation targets.
    #[inline]
    pub fn path(&self) -> &Path {
        match self {
            Op::Set { path, .. }
            | Op::Delete { path }
            | Op::Push { path, .. }
            | Op::Insert { path, .. }
            | Op::Replace { path, .. }
            | Op::Remove { path, .. }
            | Op::Swap { path, .. } => path,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Op::Set { .. } => "set",
            Op::Delete { .. } => "delete",
            Op::Push { .. } => "push",
            Op::Insert { .. } => "insert",
            Op::Replace { .. } => "replace",
            Op::Remove { .. } => "remove",
            Op::Swap { .. } => "swap",
        }
    }
}
