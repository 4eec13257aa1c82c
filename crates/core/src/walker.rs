//! Generic recursion driver over [`Value`] trees.
//!
//! Every tree-wide pass (date marking, interpolation, arithmetic, scalar
//! coercion) is expressed as a pure visitor: it receives the dotted path
//! and an owned node, and returns the replacement. Nothing here mutates
//! shared state, so passes compose without aliasing surprises.

use crate::error::ConfigError;
use crate::value::{Map, Value};

/// Apply `visit` to every non-container node, bottom-up. The path holds
/// the mapping keys from the root down to the leaf; sequence indices do
/// not contribute a segment.
pub fn map_leaves<F>(value: Value, visit: &mut F) -> Result<Value, ConfigError>
where
    F: FnMut(&[String], Value) -> Result<Value, ConfigError>,
{
    let mut path = Vec::new();
    walk_leaves(value, &mut path, visit)
}

fn walk_leaves<F>(
    value: Value,
    path: &mut Vec<String>,
    visit: &mut F,
) -> Result<Value, ConfigError>
where
    F: FnMut(&[String], Value) -> Result<Value, ConfigError>,
{
    match value {
        Value::Map(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                path.push(key.clone());
                let replaced = walk_leaves(child, path, visit)?;
                path.pop();
                out.insert(key, replaced);
            }
            Ok(Value::Map(out))
        }
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk_leaves(item, path, visit)?);
            }
            Ok(Value::Seq(out))
        }
        leaf => visit(path, leaf),
    }
}

/// Apply `visit` to every mapping key, top-down, keeping entry order. The
/// path passed to the visitor is the location of the mapping that owns the
/// key (not including the key itself).
pub fn map_keys<F>(value: Value, visit: &mut F) -> Result<Value, ConfigError>
where
    F: FnMut(&[String], &str) -> Result<String, ConfigError>,
{
    let mut path = Vec::new();
    walk_keys(value, &mut path, visit)
}

fn walk_keys<F>(
    value: Value,
    path: &mut Vec<String>,
    visit: &mut F,
) -> Result<Value, ConfigError>
where
    F: FnMut(&[String], &str) -> Result<String, ConfigError>,
{
    match value {
        Value::Map(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                let new_key = visit(path, &key)?;
                path.push(new_key.clone());
                let replaced = walk_keys(child, path, visit)?;
                path.pop();
                out.insert(new_key, replaced);
            }
            Ok(Value::Map(out))
        }
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk_keys(item, path, visit)?);
            }
            Ok(Value::Seq(out))
        }
        leaf => Ok(leaf),
    }
}

/// The chapter a path belongs to: its first segment, or `general` for
/// root-level entries.
pub fn chapter_of(path: &[String]) -> &str {
    path.first().map(String::as_str).unwrap_or("general")
}
