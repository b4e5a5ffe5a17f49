//! Path resolution over a values tree.
//!
//! Reads walk the tree and give up quietly on anything missing. Writes are
//! checked against the tree before anything is touched, so a failing
//! operation leaves the tree exactly as it was.

use crate::{
    error::{node_type_name, value_type_name, FormError, FormResult},
    Op, Path, Seg,
};
use serde_json::{Map, Value};

/// Get a reference to the node at `path`.
///
/// Returns `None` if any step is missing or steps into the wrong kind of
/// container.
///
/// ```
/// use tirea_form::{get_at_path, path};
/// use serde_json::json;
///
/// let tree = json!({"names": ["one", "two"]});
/// assert_eq!(get_at_path(&tree, &path!("names", 1)), Some(&json!("two")));
/// assert_eq!(get_at_path(&tree, &path!("names", "first")), None);
/// ```
pub fn get_at_path<'a>(tree: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = tree;
    for seg in path.segments() {
        current = match (seg, current) {
            (Seg::Key(key), Value::Object(map)) => map.get(key)?,
            (Seg::Index(idx), Value::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Apply one operation to `tree` in place.
///
/// Either the whole operation is applied or an error is returned and `tree`
/// is unchanged.
pub fn apply_op(tree: &mut Value, op: &Op) -> FormResult<()> {
    match op {
        Op::Set { path, value } => apply_set(tree, path, value.clone()),
        Op::Delete { path } => {
            apply_delete(tree, path);
            Ok(())
        }
        Op::Push { path, value } => apply_push(tree, path, value.clone()),
        Op::Insert { path, index, value } => apply_insert(tree, path, *index, value.clone()),
        Op::Replace { path, index, value } => apply_replace(tree, path, *index, value.clone()),
        Op::Remove { path, index } => apply_remove(tree, path, *index),
        Op::Swap { path, a, b } => apply_swap(tree, path, *a, *b),
    }
}

fn apply_set(tree: &mut Value, path: &Path, value: Value) -> FormResult<()> {
    check_writable(tree, path)?;
    set_at(tree, path.segments(), value);
    Ok(())
}

/// Verify that `set_at` can write `path` without coercing an existing node.
///
/// Absent and `null` nodes may be replaced by containers. Once the walk
/// leaves the existing tree every index still to come addresses a new,
/// empty sequence, so it must be 0.
fn check_writable(tree: &Value, path: &Path) -> FormResult<()> {
    let mut current = Some(tree);
    for (depth, seg) in path.iter().enumerate() {
        let node = match current {
            Some(node) if !node.is_null() => node,
            _ => return check_created(path, depth),
        };
        current = match (seg, node) {
            (Seg::Key(key), Value::Object(map)) => map.get(key),
            (Seg::Index(idx), Value::Array(arr)) => {
                if *idx > arr.len() {
                    return Err(FormError::index_out_of_range(
                        path.prefix(depth),
                        *idx,
                        arr.len(),
                    ));
                }
                arr.get(*idx)
            }
            (seg, other) => {
                return Err(FormError::invalid_container_kind(
                    path.prefix(depth),
                    seg.container_kind(),
                    value_type_name(other),
                ))
            }
        };
    }
    Ok(())
}

fn check_created(path: &Path, from: usize) -> FormResult<()> {
    for (depth, seg) in path.iter().enumerate().skip(from) {
        if let Seg::Index(idx) = seg {
            if *idx > 0 {
                return Err(FormError::index_out_of_range(path.prefix(depth), *idx, 0));
            }
        }
    }
    Ok(())
}

/// Write `value` at `segments`, creating containers on the way.
///
/// Callers run `check_writable` first; an index past the end is skipped
/// rather than panicking.
fn set_at(current: &mut Value, segments: &[Seg], value: Value) {
    match segments {
        [] => *current = value,
        [Seg::Key(key), rest @ ..] => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            if let Value::Object(map) = current {
                let entry = map.entry(key.clone()).or_insert(Value::Null);
                set_at(entry, rest, value);
            }
        }
        [Seg::Index(idx), rest @ ..] => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            if let Value::Array(arr) = current {
                if *idx == arr.len() {
                    arr.push(Value::Null);
                }
                if let Some(slot) = arr.get_mut(*idx) {
                    set_at(slot, rest, value);
                }
            }
        }
    }
}

/// Delete the node at `path`, returning it. The root resets to `null`.
fn apply_delete(tree: &mut Value, path: &Path) -> Option<Value> {
    let Some((last, parent)) = path.segments().split_last() else {
        return Some(std::mem::take(tree));
    };
    match (last, get_at_path_mut(tree, parent)?) {
        (Seg::Key(key), Value::Object(map)) => map.remove(key),
        (Seg::Index(idx), Value::Array(arr)) if *idx < arr.len() => Some(arr.remove(*idx)),
        _ => None,
    }
}

fn apply_push(tree: &mut Value, path: &Path, value: Value) -> FormResult<()> {
    match get_at_path(tree, path).map(value_type_name) {
        Some("array") => {}
        None | Some("null") => apply_set(tree, path, Value::Array(Vec::new()))?,
        Some(found) => {
            return Err(FormError::invalid_container_kind(
                path.clone(),
                "array",
                found,
            ))
        }
    }
    sequence_mut(tree, path)?.push(value);
    Ok(())
}

fn apply_insert(tree: &mut Value, path: &Path, index: usize, value: Value) -> FormResult<()> {
    let arr = sequence_mut(tree, path)?;
    if index > arr.len() {
        return Err(FormError::index_out_of_range(path.clone(), index, arr.len()));
    }
    arr.insert(index, value);
    Ok(())
}

fn apply_replace(tree: &mut Value, path: &Path, index: usize, value: Value) -> FormResult<()> {
    let arr = sequence_mut(tree, path)?;
    let len = arr.len();
    if index < len {
        arr[index] = value;
    } else if index == len {
        arr.push(value);
    } else {
        return Err(FormError::index_out_of_range(path.clone(), index, len));
    }
    Ok(())
}

fn apply_remove(tree: &mut Value, path: &Path, index: usize) -> FormResult<()> {
    let arr = sequence_mut(tree, path)?;
    if index >= arr.len() {
        return Err(FormError::index_out_of_range(path.clone(), index, arr.len()));
    }
    arr.remove(index);
    Ok(())
}

fn apply_swap(tree: &mut Value, path: &Path, a: usize, b: usize) -> FormResult<()> {
    let arr = sequence_mut(tree, path)?;
    if let Some(bad) = [a, b].into_iter().find(|i| *i >= arr.len()) {
        return Err(FormError::index_out_of_range(path.clone(), bad, arr.len()));
    }
    arr.swap(a, b);
    Ok(())
}

/// Resolve `path` to a sequence or fail with `InvalidContainerKind`.
fn sequence_mut<'a>(tree: &'a mut Value, path: &Path) -> FormResult<&'a mut Vec<Value>> {
    match get_at_path_mut(tree, path.segments()) {
        Some(Value::Array(arr)) => Ok(arr),
        other => Err(FormError::invalid_container_kind(
            path.clone(),
            "array",
            node_type_name(other.as_deref()),
        )),
    }
}

fn get_at_path_mut<'a>(current: &'a mut Value, segments: &[Seg]) -> Option<&'a mut Value> {
    match segments {
        [] => Some(current),
        [Seg::Key(key), rest @ ..] => {
            let child = current.as_object_mut()?.get_mut(key)?;
            get_at_path_mut(child, rest)
        }
        [Seg::Index(idx), rest @ ..] => {
            let child = current.as_array_mut()?.get_mut(*idx)?;
            get_at_path_mut(child, rest)
        }
    }
}
