//! `[[dotted.path-->PLACEHOLDER]]` list expansion.
//!
//! A fence names a sequence in the tree and a placeholder token. The
//! enclosing key/value pair (or string value) is duplicated once per
//! element, with the fence and every placeholder occurrence replaced by
//! the element's string form. A key fence turns one entry into several; a
//! value-only fence turns one string into a sequence. Entries carrying
//! several fences expand as the cartesian product, outermost fence first.

use crate::error::ConfigError;
use crate::interpolate::resolve_dotted;
use crate::value::{Map, Value};

const FENCE_OPEN: &str = "[[";
const FENCE_CLOSE: &str = "]]";
const FENCE_ARROW: &str = "-->";

/// Expand every fence in the tree. Lookups are resolved against the
/// `lookup` snapshot, chapter-relative to the top-level chapter the fence
/// appears under.
pub fn expand_tree(tree: Map, lookup: &Map) -> Result<Map, ConfigError> {
    let mut out = Map::with_capacity(tree.len());
    for (chapter, value) in tree {
        let expanded = expand_value(value, &chapter, lookup)?;
        out.insert(chapter, expanded);
    }
    Ok(out)
}

fn expand_value(value: Value, chapter: &str, lookup: &Map) -> Result<Value, ConfigError> {
    match value {
        Value::Map(map) => Ok(Value::Map(expand_map(map, chapter, lookup)?)),
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match expand_value(item, chapter, lookup)? {
                    // A fenced string item expands in place, flattened.
                    Value::Seq(mut several) => out.append(&mut several),
                    one => out.push(one),
                }
            }
            Ok(Value::Seq(out))
        }
        Value::Str(text) if text.contains(FENCE_OPEN) => {
            let replicas = expand_string(&text, chapter, lookup)?;
            Ok(Value::Seq(replicas.into_iter().map(Value::Str).collect()))
        }
        leaf => Ok(leaf),
    }
}

fn expand_map(map: Map, chapter: &str, lookup: &Map) -> Result<Map, ConfigError> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let value = expand_value(value, chapter, lookup)?;
        if key.contains(FENCE_OPEN) {
            for (new_key, new_value) in expand_entry(&key, &value, chapter, lookup)? {
                out.insert(new_key, new_value);
            }
        } else {
            out.insert(key, value);
        }
    }
    Ok(out)
}

/// Expand one fenced key into its replicas, recursing while replicas still
/// carry further fences.
fn expand_entry(
    key: &str,
    value: &Value,
    chapter: &str,
    lookup: &Map,
) -> Result<Vec<(String, Value)>, ConfigError> {
    let fence = parse_fence(key)?;
    let elements = fence_elements(&fence, chapter, lookup)?;
    let mut out = Vec::with_capacity(elements.len());
    for element in &elements {
        let new_key = fence.substitute(key, element);
        let new_value = substitute_deep(value.clone(), fence.placeholder, element);
        if new_key.contains(FENCE_OPEN) {
            out.extend(expand_entry(&new_key, &new_value, chapter, lookup)?);
        } else {
            out.push((new_key, new_value));
        }
    }
    Ok(out)
}

/// Expand one fenced string into its replicas.
fn expand_string(text: &str, chapter: &str, lookup: &Map) -> Result<Vec<String>, ConfigError> {
    let fence = parse_fence(text)?;
    let elements = fence_elements(&fence, chapter, lookup)?;
    let mut out = Vec::with_capacity(elements.len());
    for element in &elements {
        let replica = fence.substitute(text, element);
        if replica.contains(FENCE_OPEN) {
            out.extend(expand_string(&replica, chapter, lookup)?);
        } else {
            out.push(replica);
        }
    }
    Ok(out)
}

struct Fence<'a> {
    /// The text between `[[` and `]]`.
    body: &'a str,
    path: &'a str,
    placeholder: &'a str,
}

impl Fence<'_> {
    /// Replace the fence itself and every bare placeholder occurrence.
    fn substitute(&self, text: &str, element: &str) -> String {
        text.replace(&format!("{FENCE_OPEN}{}{FENCE_CLOSE}", self.body), element)
            .replace(self.placeholder, element)
    }
}

fn parse_fence(text: &str) -> Result<Fence<'_>, ConfigError> {
    let start = text
        .find(FENCE_OPEN)
        .ok_or_else(|| ConfigError::malformed(text, FENCE_OPEN))?;
    let after = &text[start + FENCE_OPEN.len()..];
    let end = after
        .find(FENCE_CLOSE)
        .ok_or_else(|| ConfigError::malformed(text, FENCE_CLOSE))?;
    let body = &after[..end];
    let (path, placeholder) = body
        .split_once(FENCE_ARROW)
        .ok_or_else(|| ConfigError::malformed(text, FENCE_ARROW))?;
    Ok(Fence { body, path, placeholder })
}

/// The string forms of the fenced sequence's elements. A scalar target is
/// treated as a one-element sequence.
fn fence_elements(
    fence: &Fence<'_>,
    chapter: &str,
    lookup: &Map,
) -> Result<Vec<String>, ConfigError> {
    let target = resolve_dotted(lookup, chapter, fence.path)?;
    let items: Vec<Value> = match target {
        Value::Seq(items) => items,
        scalar => vec![scalar],
    };
    items
        .iter()
        .map(|item| {
            item.as_scalar_string().ok_or_else(|| {
                ConfigError::type_mismatch(
                    fence.path,
                    format!("fence elements must be scalars, got {}", item.kind()),
                )
            })
        })
        .collect()
}

fn substitute_deep(value: Value, placeholder: &str, element: &str) -> Value {
    match value {
        Value::Str(text) => Value::Str(text.replace(placeholder, element)),
        Value::Seq(items) => Value::Seq(
            items
                .into_iter()
                .map(|item| substitute_deep(item, placeholder, element))
                .collect(),
        ),
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(key, child)| (key, substitute_deep(child, placeholder, element)))
                .collect(),
        ),
        leaf => leaf,
    }
}
