//! `add_<chapter>` / `remove_<chapter>` patch directives.
//!
//! An `add_` entry appends to (sequence) or merges into (mapping) the
//! target chapter's entry of the same name; a `remove_` entry deletes the
//! named members. Removes are tolerant: members that are already absent
//! are ignored, so patches can be written defensively.

use tracing::debug;

use crate::error::ConfigError;
use crate::merge::dict_merge;
use crate::value::{Map, Value};

/// A directive key split into its target `(chapter, entry)` pair. Keys
/// without a dot target the owning chapter.
pub fn canonical_target(key: &str, prefix: &str, owning_chapter: &str) -> (String, String) {
    let stripped = key.strip_prefix(prefix).unwrap_or(key);
    match stripped.split_once('.') {
        Some((chapter, entry)) => (chapter.to_string(), entry.to_string()),
        None => (owning_chapter.to_string(), stripped.to_string()),
    }
}

/// Fold `entries` into `chapter[target]`.
pub fn apply_add(
    chapter: &mut Map,
    target: &str,
    entries: Value,
    path: &str,
) -> Result<(), ConfigError> {
    match chapter.get_mut(target) {
        None | Some(Value::Null) => {
            chapter.insert(target.to_string(), entries);
        }
        Some(Value::Seq(existing)) => match entries {
            Value::Seq(mut incoming) => existing.append(&mut incoming),
            other => {
                return Err(ConfigError::type_mismatch(
                    path,
                    format!("cannot add a {} to a sequence", other.kind()),
                ))
            }
        },
        Some(Value::Map(existing)) => match entries {
            Value::Map(incoming) => dict_merge(existing, incoming),
            other => {
                return Err(ConfigError::type_mismatch(
                    path,
                    format!("cannot add a {} to a mapping", other.kind()),
                ))
            }
        },
        Some(other) => {
            return Err(ConfigError::type_mismatch(
                path,
                format!("cannot add entries to a {}", other.kind()),
            ))
        }
    }
    Ok(())
}

/// Delete the named members from `chapter[target]`. `entries` must be a
/// sequence of names; absent members and absent targets are ignored.
pub fn apply_remove(
    chapter: &mut Map,
    target: &str,
    entries: &Value,
    path: &str,
) -> Result<(), ConfigError> {
    let Value::Seq(names) = entries else {
        return Err(ConfigError::type_mismatch(
            path,
            format!("entries to remove must be a sequence of names, got {}", entries.kind()),
        ));
    };
    let Some(existing) = chapter.get_mut(target) else {
        debug!(target, "remove target missing, nothing to do");
        return Ok(());
    };
    for name in names {
        let Some(name) = name.as_scalar_string() else {
            return Err(ConfigError::type_mismatch(
                path,
                format!("cannot remove by a {} name", name.kind()),
            ));
        };
        match existing {
            Value::Seq(items) => {
                items.retain(|item| item.as_scalar_string().as_deref() != Some(name.as_str()));
            }
            Value::Map(map) => {
                map.shift_remove(&name);
            }
            other => {
                return Err(ConfigError::type_mismatch(
                    path,
                    format!("cannot remove entries from a {}", other.kind()),
                ))
            }
        }
    }
    Ok(())
}

/// Apply one directive key found inside `owning_chapter` to the tree.
pub fn apply_directive(
    tree: &mut Map,
    owning_chapter: &str,
    key: &str,
    value: Value,
) -> Result<(), ConfigError> {
    if key.starts_with("add_") {
        let (target_chapter, entry) = canonical_target(key, "add_", owning_chapter);
        let chapter = chapter_mut(tree, &target_chapter, key)?;
        apply_add(chapter, &entry, value, key)
    } else if key.starts_with("remove_") {
        let (target_chapter, entry) = canonical_target(key, "remove_", owning_chapter);
        let chapter = chapter_mut(tree, &target_chapter, key)?;
        apply_remove(chapter, &entry, &value, key)
    } else {
        Err(ConfigError::UndefinedKey(format!("'{key}' is not an add/remove directive")))
    }
}

fn chapter_mut<'t>(
    tree: &'t mut Map,
    chapter: &str,
    key: &str,
) -> Result<&'t mut Map, ConfigError> {
    match tree.get_mut(chapter) {
        Some(Value::Map(map)) => Ok(map),
        Some(other) => Err(ConfigError::type_mismatch(
            key,
            format!("target chapter '{chapter}' is a {}, not a mapping", other.kind()),
        )),
        None => Err(ConfigError::UndefinedKey(format!(
            "directive '{key}' targets unknown chapter '{chapter}'"
        ))),
    }
}

/// Sweep the whole tree once: collect every `add_`/`remove_` key nested
/// anywhere under a chapter, delete the directive, and apply it. Adds run
/// before removes, matching how patches are authored.
pub fn process_tree(tree: &mut Map) -> Result<(), ConfigError> {
    let chapters: Vec<String> = tree.keys().cloned().collect();
    let mut adds = Vec::new();
    let mut removes = Vec::new();
    for chapter in &chapters {
        let Some(Value::Map(chapter_map)) = tree.get_mut(chapter) else {
            continue;
        };
        collect_directives(chapter_map, chapter, &mut adds, &mut removes);
    }
    for (chapter, key, value) in adds {
        apply_directive(tree, &chapter, &key, value)?;
    }
    for (chapter, key, value) in removes {
        apply_directive(tree, &chapter, &key, value)?;
    }
    Ok(())
}

fn collect_directives(
    map: &mut Map,
    owning_chapter: &str,
    adds: &mut Vec<(String, String, Value)>,
    removes: &mut Vec<(String, String, Value)>,
) {
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        if key.starts_with("add_") {
            let value = map.shift_remove(&key).unwrap_or(Value::Null);
            adds.push((owning_chapter.to_string(), key, value));
        } else if key.starts_with("remove_") {
            let value = map.shift_remove(&key).unwrap_or(Value::Null);
            removes.push((owning_chapter.to_string(), key, value));
        } else if let Some(Value::Map(nested)) = map.get_mut(&key) {
            collect_directives(nested, owning_chapter, adds, removes);
        }
    }
}
