//! Resolution orchestration.
//!
//! [`Resolver`] owns the pass ordering: combine the partial trees by
//! priority, settle choose blocks and add/remove patches, then drive the
//! tree-wide passes (date marking, interpolation over values and keys,
//! arithmetic, unmarking, list expansion) twice — once with the gray list
//! excluded, once unrestricted — and finish with scalar coercion and an
//! invariant sweep. All run-scoped state (gray list, marker, calendar,
//! config root) lives in [`EngineConfig`]; nothing is global.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::addremove;
use crate::calendar::Calendar;
use crate::choose::{self, Task};
use crate::dates::{self, DATE_MARKER};
use crate::error::ConfigError;
use crate::interpolate::{GrayList, Interpolator, Scope};
use crate::loader::Loader;
use crate::merge::{dict_merge, priority_merge};
use crate::multikey;
use crate::value::{Map, Value};

/// Everything one resolution run needs. Construct once per run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory the loader resolves component references against.
    pub root: PathBuf,
    /// Variables protected from the first interpolation pass.
    pub gray: GrayList,
    /// Sentinel appended to date-keyed scalars during interpolation.
    pub marker: String,
    pub calendar: Calendar,
}

impl EngineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        EngineConfig {
            root: root.into(),
            gray: GrayList::default_rules(),
            marker: DATE_MARKER.to_string(),
            calendar: Calendar::ProlepticGregorian,
        }
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }
}

pub struct Resolver {
    config: EngineConfig,
}

impl Resolver {
    pub fn new(config: EngineConfig) -> Self {
        Resolver { config }
    }

    pub fn loader(&self) -> Loader {
        Loader::new(self.config.root.clone())
    }

    /// Load a setup document and pull in the component chapters named by
    /// its `include_models` / `include_submodels` directives. Settings in
    /// the setup itself win over the included component documents.
    pub fn load_setup(&self, path: impl AsRef<Path>) -> Result<Map, ConfigError> {
        let loader = self.loader();
        let mut setup = loader.load(path)?;
        let mut included = Map::new();
        loader.attach_and_reduce(&mut setup, "include_models", "models", &mut included)?;
        loader.attach_and_reduce(&mut setup, "include_submodels", "submodels", &mut included)?;
        Ok(priority_merge(setup, included))
    }

    /// Combine partial trees into one working tree, most preferred first
    /// (user > setup > model).
    pub fn combine(trees: Vec<Map>) -> Map {
        trees.into_iter().reduce(priority_merge).unwrap_or_default()
    }

    /// Run the full resolution pipeline over a combined working tree.
    pub fn resolve(&self, mut tree: Map) -> Result<Map, ConfigError> {
        if !tree.contains_key("general") {
            tree.insert("general".to_string(), Value::Map(Map::new()));
        }
        check_declared_chapters(&tree)?;
        check_conflicting_names(&tree)?;
        update_models_from_setup(&mut tree)?;

        self.round(&mut tree, Scope::ExcludeGray)?;
        let deferred = self.round(&mut tree, Scope::All)?;
        if let Some((_, key)) = deferred.first() {
            return Err(ConfigError::UndefinedKey(format!(
                "choose block '{key}' never saw a concrete discriminant"
            )));
        }

        let tree = into_root(dates::coerce_scalars(Value::Map(tree))?)?;
        check_resolved(&tree, &self.config.gray)?;
        info!(chapters = tree.len(), "configuration resolved");
        Ok(tree)
    }

    /// One resolution round at the given scope. Returns the choose blocks
    /// still deferred at the end of the round.
    fn round(&self, tree: &mut Map, scope: Scope) -> Result<Vec<Task>, ConfigError> {
        debug!(?scope, "resolution round");
        choose::resolve_blocks(tree, &self.config.gray, scope)?;
        addremove::process_tree(tree)?;

        let mut value = Value::Map(std::mem::take(tree));
        value = dates::mark(value, &self.config.marker)?;

        let snapshot = match &value {
            Value::Map(map) => map.clone(),
            _ => Map::new(),
        };
        let pass = Interpolator {
            lookup: &snapshot,
            gray: &self.config.gray,
            scope,
            marker: &self.config.marker,
            calendar: self.config.calendar,
        };
        value = pass.run_on_values(value)?;
        value = pass.run_on_keys(value)?;
        *tree = into_root(value)?;

        // Interpolation may have concretised a discriminant a previous
        // attempt deferred on.
        let deferred = choose::resolve_blocks(tree, &self.config.gray, scope)?;
        addremove::process_tree(tree)?;

        let mut value = Value::Map(std::mem::take(tree));
        value = dates::evaluate(value, &self.config.marker, self.config.calendar)?;
        value = dates::unmark_and_materialise(value, &self.config.marker, self.config.calendar)?;
        let map = into_root(value)?;
        let snapshot = map.clone();
        *tree = multikey::expand_tree(map, &snapshot)?;
        Ok(deferred)
    }
}

fn into_root(value: Value) -> Result<Map, ConfigError> {
    match value {
        Value::Map(map) => Ok(map),
        other => Err(ConfigError::type_mismatch(
            "<root>",
            format!("the configuration root must stay a mapping, got {}", other.kind()),
        )),
    }
}

fn declared_names(tree: &Map, list: &str) -> Vec<String> {
    tree.get("general")
        .and_then(Value::as_map)
        .and_then(|general| general.get(list))
        .and_then(Value::as_seq)
        .map(|names| names.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Every declared model/setup name must exist as a top-level chapter.
fn check_declared_chapters(tree: &Map) -> Result<(), ConfigError> {
    for list in ["valid_model_names", "valid_setup_names"] {
        for name in declared_names(tree, list) {
            if !tree.contains_key(&name) {
                return Err(ConfigError::UndefinedKey(format!(
                    "'{name}' is listed in {list} but has no chapter"
                )));
            }
        }
    }
    Ok(())
}

/// A model chapter must not redefine another chapter's name inside itself.
fn check_conflicting_names(tree: &Map) -> Result<(), ConfigError> {
    let chapters: Vec<&String> = tree.keys().collect();
    for source in declared_names(tree, "valid_model_names") {
        let Some(source_map) = tree.get(&source).and_then(Value::as_map) else {
            continue;
        };
        for chapter in &chapters {
            if source != **chapter && source_map.contains_key(*chapter) {
                return Err(ConfigError::ConflictingDefinition {
                    chapter: source.clone(),
                    name: (*chapter).clone(),
                });
            }
        }
    }
    Ok(())
}

/// Model settings written inside the `general` chapter are merged down
/// into the matching top-level chapter.
fn update_models_from_setup(tree: &mut Map) -> Result<(), ConfigError> {
    for name in declared_names(tree, "valid_model_names") {
        let Some(Value::Map(general)) = tree.get_mut("general") else {
            return Ok(());
        };
        let Some(from_setup) = general.shift_remove(&name) else {
            continue;
        };
        let Value::Map(from_setup) = from_setup else {
            return Err(ConfigError::type_mismatch(
                &name,
                format!("model settings under general must be a mapping, got {}", from_setup.kind()),
            ));
        };
        match tree.get_mut(&name).and_then(Value::as_map_mut) {
            Some(target) => dict_merge(target, from_setup),
            None => {
                tree.insert(name, Value::Map(from_setup));
            }
        }
    }
    Ok(())
}

/// Post-run sweep: no directive keys anywhere, no `${...}` outside the
/// gray list.
fn check_resolved(tree: &Map, gray: &GrayList) -> Result<(), ConfigError> {
    crate::walker::map_leaves(Value::Map(tree.clone()), &mut |path, leaf| {
        if let Value::Str(text) = &leaf {
            let name = path.last().map(String::as_str).unwrap_or_default();
            if text.contains("${") && !gray.matches(name) {
                return Err(ConfigError::UndefinedKey(format!(
                    "'{}' still contains an unresolved variable: {text}",
                    path.join(".")
                )));
            }
        }
        Ok(leaf)
    })?;
    crate::walker::map_keys(Value::Map(tree.clone()), &mut |path, key| {
        if key.starts_with("choose_") || key.starts_with("add_") || key.starts_with("remove_") {
            return Err(ConfigError::UndefinedKey(format!(
                "directive '{key}' survived resolution under '{}'",
                path.join(".")
            )));
        }
        Ok(key.to_string())
    })?;
    Ok(())
}
