//! Resolution and mutation of paths inside `serde_json::Value` trees.
//!
//! Absence is a value here: a path that does not resolve yields `None`,
//! never an error. Predicate logic decides what absence means.

use serde_json::Value;

use crate::doc::path::{Path, PathSeg};
use crate::error::{Result, TramaError};

/// Resolves `path` relative to `root`, returning the node it addresses.
///
/// Wildcard paths never resolve to a single node; use [`nodes_at`] for
/// those.
pub fn node_at<'d>(root: &'d Value, path: &Path) -> Option<&'d Value> {
    let mut cur = root;
    for seg in path.segments() {
        match seg {
            PathSeg::Field(name) => cur = cur.as_object()?.get(name.as_ref())?,
            PathSeg::Index(i) => cur = cur.as_array()?.get(*i)?,
            PathSeg::Any => return None,
        }
    }
    Some(cur)
}

/// Resolves `path` relative to `root`, expanding `*` wildcards over array
/// elements. Returns every matching node with its concrete path.
pub fn nodes_at<'d>(root: &'d Value, path: &Path) -> Vec<(Path, &'d Value)> {
    let mut out = Vec::new();
    collect(root, path.segments(), Path::empty(), &mut out);
    out
}

fn collect<'d>(node: &'d Value, segs: &[PathSeg], at: Path, out: &mut Vec<(Path, &'d Value)>) {
    let Some((seg, rest)) = segs.split_first() else {
        out.push((at, node));
        return;
    };
    match seg {
        PathSeg::Field(name) => {
            if let Some(child) = node.as_object().and_then(|o| o.get(name.as_ref())) {
                collect(child, rest, at.appended_seg(seg.clone()), out);
            }
        }
        PathSeg::Index(i) => {
            if let Some(child) = node.as_array().and_then(|a| a.get(*i)) {
                collect(child, rest, at.appended_index(*i), out);
            }
        }
        PathSeg::Any => {
            if let Some(items) = node.as_array() {
                for (i, child) in items.iter().enumerate() {
                    collect(child, rest, at.appended_index(i), out);
                }
            }
        }
    }
}

/// Sets the value at `path`, creating missing intermediate objects.
///
/// Index segments must address existing array elements; wildcards are
/// rejected. The final segment may name a new object field or replace an
/// existing array element.
pub fn set_at(root: &mut Value, path: &Path, value: Value) -> Result<()> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Err(TramaError::InvalidArgument(
            "cannot set the document root".into(),
        ));
    };
    let mut cur = root;
    for seg in parents {
        cur = match seg {
            PathSeg::Field(name) => cur
                .as_object_mut()
                .ok_or_else(|| {
                    TramaError::InvalidArgument(format!("'{name}' parent is not an object"))
                })?
                .entry(name.as_ref())
                .or_insert_with(|| Value::Object(Default::default())),
            PathSeg::Index(i) => cur
                .as_array_mut()
                .and_then(|a| a.get_mut(*i))
                .ok_or_else(|| {
                    TramaError::InvalidArgument(format!("no array element at index {i}"))
                })?,
            PathSeg::Any => {
                return Err(TramaError::InvalidArgument(
                    "cannot set through a wildcard".into(),
                ))
            }
        };
    }
    match last {
        PathSeg::Field(name) => {
            cur.as_object_mut()
                .ok_or_else(|| {
                    TramaError::InvalidArgument(format!("'{name}' parent is not an object"))
                })?
                .insert(name.to_string(), value);
        }
        PathSeg::Index(i) => {
            let slot = cur.as_array_mut().and_then(|a| a.get_mut(*i)).ok_or_else(|| {
                TramaError::InvalidArgument(format!("no array element at index {i}"))
            })?;
            *slot = value;
        }
        PathSeg::Any => {
            return Err(TramaError::InvalidArgument(
                "cannot set through a wildcard".into(),
            ))
        }
    }
    Ok(())
}
