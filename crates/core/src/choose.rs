//! `choose_<path>` block resolution.
//!
//! A choose block branches on the current value of its discriminant
//! variable and merges the selected branch's patch into the owning
//! chapter. Blocks may set variables that other blocks branch on, so
//! resolution is demand-driven: before a block is resolved, any pending
//! block that would define its discriminant is resolved first, and a loop
//! in that ordering is a fatal cyclic dependency.
//!
//! A block whose discriminant still reads `${...}` is deferred; the engine
//! retries it after the next interpolation pass.

use tracing::{debug, warn};

use crate::addremove;
use crate::error::ConfigError;
use crate::interpolate::{resolve_dotted, GrayList, Scope};
use crate::merge::dict_merge;
use crate::value::{Map, Value};

/// A pending block: `(chapter, choose_key)`.
pub type Task = (String, String);

enum Outcome {
    Resolved,
    Deferred,
}

/// Resolve choose blocks until none that this pass may touch remain.
/// Returns the blocks that were deferred on an unresolved discriminant.
pub fn resolve_blocks(
    tree: &mut Map,
    gray: &GrayList,
    scope: Scope,
) -> Result<Vec<Task>, ConfigError> {
    let mut deferred: Vec<Task> = Vec::new();
    loop {
        canonicalise_keys(tree);
        let pending = pending_blocks(tree, gray, scope, &deferred);
        if pending.is_empty() {
            break;
        }

        let chapters: Vec<String> = tree.keys().cloned().collect();
        let mut dependency_sets: Vec<(Task, Vec<(String, String)>)> = Vec::new();
        for task in &pending {
            let block = tree
                .get(&task.0)
                .and_then(Value::as_map)
                .and_then(|chapter| chapter.get(&task.1));
            let set = match block {
                Some(Value::Map(branches)) => {
                    let mut out = Vec::new();
                    collect_set_variables(branches, &task.0, &chapters, &mut out);
                    out
                }
                _ => Vec::new(),
            };
            dependency_sets.push((task.clone(), set));
        }

        let task = pick_independent(&dependency_sets)?;
        debug!(chapter = %task.0, key = %task.1, "resolving choose block");
        match resolve_one(tree, &task)? {
            Outcome::Resolved => {}
            Outcome::Deferred => {
                debug!(key = %task.1, "discriminant unresolved, deferring block");
                deferred.push(task);
            }
        }
    }
    Ok(deferred)
}

/// Rename unscoped `choose_x` keys at chapter top level to their canonical
/// `choose_<chapter>.x` form.
fn canonicalise_keys(tree: &mut Map) {
    let chapters: Vec<String> = tree.keys().cloned().collect();
    for chapter in chapters {
        let Some(Value::Map(chapter_map)) = tree.get_mut(&chapter) else {
            continue;
        };
        let keys: Vec<String> = chapter_map.keys().cloned().collect();
        for key in keys {
            if let Some(var) = key.strip_prefix("choose_") {
                if !var.contains('.') {
                    let canonical = format!("choose_{chapter}.{var}");
                    if let Some(block) = chapter_map.shift_remove(&key) {
                        chapter_map.insert(canonical, block);
                    }
                }
            }
        }
    }
}

fn pending_blocks(tree: &Map, gray: &GrayList, scope: Scope, deferred: &[Task]) -> Vec<Task> {
    let mut pending = Vec::new();
    for (chapter, value) in tree {
        let Some(chapter_map) = value.as_map() else {
            continue;
        };
        for key in chapter_map.keys() {
            if !key.starts_with("choose_") {
                continue;
            }
            if scope == Scope::ExcludeGray && gray.matches(key) {
                continue;
            }
            let task = (chapter.clone(), key.clone());
            if !deferred.contains(&task) {
                pending.push(task);
            }
        }
    }
    pending
}

/// Collect the `(chapter, variable)` pairs a block would define if any of
/// its branches were merged. Nested keys that name a chapter switch the
/// attribution to that chapter.
fn collect_set_variables(
    map: &Map,
    model: &str,
    chapters: &[String],
    out: &mut Vec<(String, String)>,
) {
    for (key, value) in map {
        let model_here = if chapters.iter().any(|c| c == key) { key } else { model };
        match value {
            Value::Map(nested) => collect_set_variables(nested, model_here, chapters, out),
            _ => out.push((model_here.to_string(), key.clone())),
        }
    }
}

/// Pick the first pending block whose discriminant is not defined by any
/// other pending block, chasing prerequisites and failing on a loop.
fn pick_independent(
    dependency_sets: &[(Task, Vec<(String, String)>)],
) -> Result<Task, ConfigError> {
    let mut candidate = dependency_sets[0].0.clone();
    let mut chain: Vec<Task> = vec![candidate.clone()];
    'chase: loop {
        let var = candidate.1.trim_start_matches("choose_");
        let (var_chapter, var_name) = var.split_once('.').unwrap_or(("", var));
        for (task, set) in dependency_sets {
            if *task == candidate {
                continue;
            }
            let defines = set.iter().any(|(model, name)| {
                name == var || (model == var_chapter && name == var_name)
            });
            if defines {
                if chain.contains(task) {
                    let mut cycle: Vec<String> =
                        chain.iter().map(|(_, key)| key.clone()).collect();
                    cycle.push(task.1.clone());
                    return Err(ConfigError::CyclicDependency(cycle.join(" -> ")));
                }
                chain.insert(0, task.clone());
                candidate = task.clone();
                continue 'chase;
            }
        }
        return Ok(candidate);
    }
}

fn resolve_one(tree: &mut Map, task: &Task) -> Result<Outcome, ConfigError> {
    let (chapter, choose_key) = task;
    let var = choose_key.trim_start_matches("choose_");

    let discriminant = match resolve_dotted(tree, chapter, var) {
        Ok(value) => Some(value),
        Err(ConfigError::UndefinedKey(_)) => None,
        Err(other) => return Err(other),
    };

    // Defer before taking the block out: the discriminant still carries an
    // uninterpolated variable, so branching on it would be meaningless.
    if let Some(Value::Str(text)) = &discriminant {
        if text.contains("${") {
            return Ok(Outcome::Deferred);
        }
    }

    let chapter_map = tree
        .get_mut(chapter)
        .and_then(Value::as_map_mut)
        .ok_or_else(|| ConfigError::UndefinedKey(chapter.clone()))?;
    let block = chapter_map
        .shift_remove(choose_key)
        .ok_or_else(|| ConfigError::UndefinedKey(choose_key.clone()))?;
    let Value::Map(mut branches) = block else {
        return Err(ConfigError::type_mismatch(
            choose_key,
            format!("a choose block must be a mapping, got {}", block.kind()),
        ));
    };

    let patch = match discriminant {
        None => match branches.shift_remove("*") {
            Some(patch) => patch,
            None => {
                return Err(ConfigError::UndefinedKey(format!(
                    "choose block '{choose_key}' branches on undefined '{var}' and has no '*'"
                )))
            }
        },
        Some(value) => {
            let choice = value.as_scalar_string().ok_or_else(|| {
                ConfigError::type_mismatch(
                    var,
                    format!("cannot branch on a {}", value.kind()),
                )
            })?;
            match branches.shift_remove(&choice).or_else(|| branches.shift_remove("*")) {
                Some(patch) => patch,
                None => {
                    // Tolerated: the block is discarded so partially
                    // specified configurations keep resolving.
                    warn!(
                        "{}",
                        ConfigError::AmbiguousChoice {
                            key: choose_key.clone(),
                            choice: choice.clone(),
                        }
                    );
                    return Ok(Outcome::Resolved);
                }
            }
        }
    };

    let Value::Map(patch) = patch else {
        return Err(ConfigError::type_mismatch(
            choose_key,
            format!("a choose branch must be a mapping, got {}", patch.kind()),
        ));
    };
    merge_patch(tree, chapter, patch)
}

/// Fold a selected branch into its chapter: plain keys deep-merge,
/// `add_`/`remove_` keys go through the chapter processor.
fn merge_patch(tree: &mut Map, chapter: &str, patch: Map) -> Result<Outcome, ConfigError> {
    let mut adds = Vec::new();
    let mut removes = Vec::new();
    let mut plain = Map::new();
    for (key, value) in patch {
        if key.starts_with("add_") {
            adds.push((key, value));
        } else if key.starts_with("remove_") {
            removes.push((key, value));
        } else {
            plain.insert(key, value);
        }
    }

    let chapter_map = tree
        .get_mut(chapter)
        .and_then(Value::as_map_mut)
        .ok_or_else(|| ConfigError::UndefinedKey(chapter.to_string()))?;
    dict_merge(chapter_map, plain);

    for (key, value) in adds {
        addremove::apply_directive(tree, chapter, &key, value)?;
    }
    for (key, value) in removes {
        addremove::apply_directive(tree, chapter, &key, value)?;
    }
    Ok(Outcome::Resolved)
}
