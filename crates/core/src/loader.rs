//! Document loading and attachment resolution.
//!
//! Profiles are plain YAML files addressed without an extension; loading
//! tries the bare path first and then the usual suffix spellings. Two
//! attachment directives are resolved at load time:
//!
//! - `further_reading`: the named files are merged (shallow, later wins)
//!   straight into the loading document. This happens before any variable
//!   context exists, so files reached this way must not contain `${...}`.
//! - `include_models` / `include_submodels`: each entry `component.suffix`
//!   pulls in `<root>/<component>/<component>.<suffix>.yaml` as a whole new
//!   chapter, keyed by the document's own `model` field.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::value::{Map, Value};

/// Extension spellings tried, in order, when loading a document.
pub const YAML_AUTO_EXTENSIONS: [&str; 5] = ["", ".yml", ".yaml", ".YML", ".YAML"];

/// Directives resolved immediately on every document load.
pub const ALWAYS_ATTACH_AND_REMOVE: [&str; 1] = ["further_reading"];

/// Loads YAML documents relative to a configuration root directory.
#[derive(Debug, Clone)]
pub struct Loader {
    root: PathBuf,
}

impl Loader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Loader { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a document, resolving `further_reading` before returning.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Map, ConfigError> {
        let mut tree = self.load_raw(path.as_ref())?;
        for directive in ALWAYS_ATTACH_AND_REMOVE {
            self.attach_and_remove(&mut tree, directive)?;
        }
        Ok(tree)
    }

    /// Load a document with extension fallback, without attachment
    /// handling. The top level must be a mapping.
    pub fn load_raw(&self, path: &Path) -> Result<Map, ConfigError> {
        let shown = path.display().to_string();
        for extension in YAML_AUTO_EXTENSIONS {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(extension);
            let candidate = PathBuf::from(candidate);
            let text = match std::fs::read_to_string(&candidate) {
                Ok(text) => text,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %candidate.display(), "not found, trying next extension");
                    continue;
                }
                Err(err) => return Err(ConfigError::Read(shown, err)),
            };
            let yaml: serde_yaml::Value = serde_yaml::from_str(&text)
                .map_err(|err| ConfigError::Parse(candidate.display().to_string(), err))?;
            return match Value::from_yaml(yaml) {
                Value::Map(map) => Ok(map),
                other => Err(ConfigError::type_mismatch(
                    candidate.display().to_string(),
                    format!("expected a mapping at the document root, got {}", other.kind()),
                )),
            };
        }
        Err(ConfigError::NotFound(shown))
    }

    /// Resolve one `further_reading`-style directive: load each referenced
    /// file and merge its top level into `tree` (shallow, later wins),
    /// then delete the directive key.
    pub fn attach_and_remove(&self, tree: &mut Map, key: &str) -> Result<(), ConfigError> {
        let Some(value) = tree.shift_remove(key) else {
            return Ok(());
        };
        match value {
            Value::Str(reference) => self.attach_one(tree, &reference)?,
            Value::Seq(references) => {
                for reference in references {
                    let Some(reference) = reference.as_str() else {
                        return Err(ConfigError::type_mismatch(
                            key,
                            format!("file references must be strings, got {}", reference.kind()),
                        ));
                    };
                    self.attach_one(tree, reference)?;
                }
            }
            other => {
                return Err(ConfigError::type_mismatch(
                    key,
                    format!("expected a string or sequence of strings, got {}", other.kind()),
                ))
            }
        }
        Ok(())
    }

    fn attach_one(&self, tree: &mut Map, reference: &str) -> Result<(), ConfigError> {
        let component = reference.split('.').next().unwrap_or(reference);
        let path = self.root.join(component).join(reference);
        debug!(reference, path = %path.display(), "attaching document");
        let attached = self.load_raw(&path)?;
        for (key, value) in attached {
            tree.insert(key, value);
        }
        Ok(())
    }

    /// Resolve an `include_models`/`include_submodels` directive: rename
    /// `tree[full_key]` to `reduced_key`, and load each referenced
    /// component document into `target` as a new chapter keyed by the
    /// document's declared `model` name.
    pub fn attach_and_reduce(
        &self,
        tree: &mut Map,
        full_key: &str,
        reduced_key: &str,
        target: &mut Map,
    ) -> Result<(), ConfigError> {
        let Some(value) = tree.shift_remove(full_key) else {
            return Ok(());
        };
        let Value::Seq(entries) = &value else {
            return Err(ConfigError::type_mismatch(
                full_key,
                format!("expected a sequence of component references, got {}", value.kind()),
            ));
        };
        for entry in entries {
            let Some(reference) = entry.as_str() else {
                return Err(ConfigError::type_mismatch(
                    full_key,
                    format!("component references must be strings, got {}", entry.kind()),
                ));
            };
            let component = reference.split('.').next().unwrap_or(reference);
            let path = self.root.join(component).join(reference);
            debug!(reference, path = %path.display(), "including component");
            let document = self.load(&path)?;
            let model = document
                .get("model")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    ConfigError::UndefinedKey(format!(
                        "included document '{reference}' declares no 'model' name"
                    ))
                })?;
            target.insert(model, Value::Map(document));
        }
        tree.insert(reduced_key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn load_tries_every_extension() {
        for extension in YAML_AUTO_EXTENSIONS {
            let dir = tempdir().unwrap();
            write(dir.path(), &format!("setup{extension}"), "model: pism\n");
            let loader = Loader::new(dir.path());
            let tree = loader.load(dir.path().join("setup")).unwrap();
            assert_eq!(tree["model"].as_str(), Some("pism"));
        }
    }

    #[test]
    fn load_fails_after_exhausting_extensions() {
        let dir = tempdir().unwrap();
        write(dir.path(), "setup.hjkl", "model: pism\n");
        let loader = Loader::new(dir.path());
        let err = loader.load(dir.path().join("setup")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn further_reading_is_attached_and_removed() {
        let dir = tempdir().unwrap();
        write(dir.path(), "echam/example.yaml", "further_reading: echam.extras\n");
        write(dir.path(), "echam/echam.extras.yaml", "stuff: things\n");
        let loader = Loader::new(dir.path());
        let tree = loader.load(dir.path().join("echam/example")).unwrap();
        assert!(!tree.contains_key("further_reading"));
        assert_eq!(tree["stuff"].as_str(), Some("things"));
    }

    #[test]
    fn further_reading_accepts_a_list() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "echam/example.yaml",
            "further_reading:\n  - echam.one\n  - echam.two\n",
        );
        write(dir.path(), "echam/echam.one.yaml", "a: 1\nshared: one\n");
        write(dir.path(), "echam/echam.two.yaml", "b: 2\nshared: two\n");
        let loader = Loader::new(dir.path());
        let tree = loader.load(dir.path().join("echam/example")).unwrap();
        assert_eq!(tree["a"], Value::Int(1));
        assert_eq!(tree["b"], Value::Int(2));
        // Shallow merge, later file wins.
        assert_eq!(tree["shared"].as_str(), Some("two"));
    }

    #[test]
    fn attach_and_reduce_registers_model_chapters() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "echam/echam.satellites.yaml",
            "model: luna\ndescription: The Moon\n",
        );
        let loader = Loader::new(dir.path());
        let mut tree = crate::value::from_yaml_str("added_stuff:\n  - echam.satellites\n")
            .unwrap()
            .into_map()
            .unwrap();
        let mut target = Map::new();
        loader.attach_and_reduce(&mut tree, "added_stuff", "files", &mut target).unwrap();
        assert!(!tree.contains_key("added_stuff"));
        assert!(tree.contains_key("files"));
        assert_eq!(
            target["luna"].get_path(&["description"]).unwrap().as_str(),
            Some("The Moon")
        );
    }

    #[test]
    fn attach_and_reduce_rejects_scalars() {
        let dir = tempdir().unwrap();
        let loader = Loader::new(dir.path());
        let mut tree = crate::value::from_yaml_str("include_models: satellites\n")
            .unwrap()
            .into_map()
            .unwrap();
        let mut target = Map::new();
        let err = loader
            .attach_and_reduce(&mut tree, "include_models", "models", &mut target)
            .unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { .. }));
    }
}
