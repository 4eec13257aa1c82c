//! The value model: the common currency of every resolution pass.
//!
//! Configuration trees are mappings of *chapters* (one per model component,
//! plus `general` and `computer`) holding arbitrarily nested mappings,
//! sequences and scalars. Mappings keep insertion order so chapter and key
//! iteration stays deterministic across runs.

use indexmap::IndexMap;

use crate::calendar::Date;

/// An ordered string-keyed mapping.
pub type Map = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(Date),
    Seq(Vec<Value>),
    Map(Map),
}

impl Value {
    /// Convert a parsed YAML document. Non-string mapping keys are
    /// stringified, so `2005: ...` and `"2005": ...` select the same
    /// choose branch.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Value {
        match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Value::Str(s),
            serde_yaml::Value::Sequence(items) => {
                Value::Seq(items.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(mapping) => {
                let mut map = Map::new();
                for (k, v) in mapping {
                    map.insert(yaml_key_to_string(&k), Value::from_yaml(v));
                }
                Value::Map(map)
            }
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }

    /// Render back to YAML, for printing resolved trees. Dates render in
    /// their parsed layout.
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Value::Null => serde_yaml::Value::Null,
            Value::Bool(b) => serde_yaml::Value::Bool(*b),
            Value::Int(i) => serde_yaml::Value::Number((*i).into()),
            Value::Float(f) => serde_yaml::Value::Number(serde_yaml::Number::from(*f)),
            Value::Str(s) => serde_yaml::Value::String(s.clone()),
            Value::Date(d) => serde_yaml::Value::String(d.output()),
            Value::Seq(items) => {
                serde_yaml::Value::Sequence(items.iter().map(Value::to_yaml).collect())
            }
            Value::Map(map) => {
                let mut mapping = serde_yaml::Mapping::new();
                for (k, v) in map {
                    mapping.insert(serde_yaml::Value::String(k.clone()), v.to_yaml());
                }
                serde_yaml::Value::Mapping(mapping)
            }
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// String form of a scalar, `None` for mappings and sequences.
    pub fn as_scalar_string(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.clone()),
            Value::Date(d) => Some(d.output()),
            Value::Seq(_) | Value::Map(_) => None,
        }
    }

    /// Sequential dotted-path lookup through nested mappings.
    pub fn get_path(&self, segments: &[&str]) -> Option<&Value> {
        let mut current = self;
        for segment in segments {
            current = current.as_map()?.get(*segment)?;
        }
        Some(current)
    }

    /// A short name for the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Date(_) => "date",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
        }
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

fn yaml_key_to_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Parse a YAML string straight into a [`Value`].
pub fn from_yaml_str(text: &str) -> Result<Value, serde_yaml::Error> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(Value::from_yaml(yaml))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_roundtrip_preserves_order() {
        let value = from_yaml_str("z: 1\na: 2\nm: 3\n").unwrap();
        let map = value.as_map().unwrap();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let value = from_yaml_str("1: one\ntrue: yes\n").unwrap();
        let map = value.as_map().unwrap();
        assert!(map.contains_key("1"));
        assert!(map.contains_key("true"));
    }

    #[test]
    fn get_path_walks_nested_maps() {
        let value = from_yaml_str("echam:\n  nest:\n    res: T63\n").unwrap();
        assert_eq!(
            value.get_path(&["echam", "nest", "res"]),
            Some(&Value::Str("T63".into()))
        );
        assert_eq!(value.get_path(&["echam", "missing"]), None);
    }

    #[test]
    fn scalar_strings() {
        assert_eq!(Value::Bool(true).as_scalar_string().unwrap(), "true");
        assert_eq!(Value::Int(12).as_scalar_string().unwrap(), "12");
        assert!(from_yaml_str("[1]").unwrap().as_scalar_string().is_none());
    }
}
