//! Variable interpolation: `${dotted.path}` tokens in string scalars (and
//! mapping keys) are replaced by the value found at that path.
//!
//! Lookup is chapter-relative by default: a path whose first segment is
//! not a top-level chapter is retried with the current chapter prepended,
//! and a failed lookup falls back to the `general` chapter before giving
//! up. Resolved values that themselves contain `${...}` are resolved
//! recursively, so chained indirection works.
//!
//! The *gray list* excludes ordering-sensitive variables (resume flags,
//! date fields) from the first pass; the engine runs a second pass with
//! the exclusion disabled once choose blocks are settled.

use regex::Regex;

use crate::calendar::{Calendar, Date};
use crate::error::ConfigError;
use crate::value::{Map, Value};
use crate::walker::{self, chapter_of};

/// Recursion cap for chained `${...}` indirection; beyond this the chain
/// is reported as cyclic.
const MAX_INDIRECTION: usize = 32;

/// Variable patterns excluded from a gray-listed interpolation pass.
#[derive(Debug, Clone)]
pub struct GrayList {
    patterns: Vec<Regex>,
}

impl GrayList {
    /// The default exclusions: resume flags and date-valued fields, which
    /// must survive until choose resolution and date marking are done.
    pub fn default_rules() -> Self {
        GrayList::from_patterns(&[
            r"choose_lresume",
            r"choose_.*lresume",
            r"lresume",
            r".*date$",
            r".*date!(year|month|day|hour|minute|second)",
        ])
        .expect("default gray list patterns are valid")
    }

    pub fn from_patterns(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns.iter().map(|p| Regex::new(p)).collect::<Result<_, _>>()?;
        Ok(GrayList { patterns })
    }

    pub fn empty() -> Self {
        GrayList { patterns: Vec::new() }
    }

    /// Anchored match of `name` against any pattern.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.find(name).is_some_and(|m| m.start() == 0))
    }
}

/// Which variables a pass is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Skip gray-listed variables (first pass).
    ExcludeGray,
    /// Interpolate everything (final pass).
    All,
}

/// One interpolation pass over a whole tree. The `lookup` tree is the
/// snapshot variables are resolved against; passes read from the snapshot
/// and build a fresh tree, so no shared mutation is involved.
pub struct Interpolator<'a> {
    pub lookup: &'a Map,
    pub gray: &'a GrayList,
    pub scope: Scope,
    pub marker: &'a str,
    pub calendar: Calendar,
}

impl<'a> Interpolator<'a> {
    /// Interpolate every string leaf.
    pub fn run_on_values(&self, tree: Value) -> Result<Value, ConfigError> {
        walker::map_leaves(tree, &mut |path, leaf| match leaf {
            Value::Str(text) if text.contains("${") => {
                let replaced = self.interpolate(chapter_of(path), &text, 0)?;
                Ok(Value::Str(replaced))
            }
            other => Ok(other),
        })
    }

    /// Interpolate every mapping key.
    pub fn run_on_keys(&self, tree: Value) -> Result<Value, ConfigError> {
        walker::map_keys(tree, &mut |path, key| {
            if key.contains("${") {
                self.interpolate(chapter_of(path), key, 0)
            } else {
                Ok(key.to_string())
            }
        })
    }

    /// Replace each `${...}` occurrence in `input`, left to right.
    pub fn interpolate(
        &self,
        chapter: &str,
        input: &str,
        depth: usize,
    ) -> Result<String, ConfigError> {
        if depth > MAX_INDIRECTION {
            return Err(ConfigError::CyclicDependency(format!(
                "variable indirection in '{input}' never terminates"
            )));
        }
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(ConfigError::malformed(input, "}"));
            };
            let token = &after[..end];
            rest = &after[end + 1..];

            if self.scope == Scope::ExcludeGray && self.gray.matches(token) {
                out.push_str("${");
                out.push_str(token);
                out.push('}');
                continue;
            }

            let rendered = self.render_token(chapter, token)?;
            if rendered.contains("${") {
                out.push_str(&self.interpolate(chapter, &rendered, depth + 1)?);
            } else {
                out.push_str(&rendered);
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Resolve one token to its spliced string form, applying any
    /// `!attribute` projections.
    fn render_token(&self, chapter: &str, token: &str) -> Result<String, ConfigError> {
        let (path, attributes) = match token.split_once('!') {
            Some((path, attrs)) => (path, Some(attrs)),
            None => (token, None),
        };
        let value = resolve_dotted(self.lookup, chapter, path)?;
        if let Some(attributes) = attributes {
            return self.project_attributes(path, &value, attributes);
        }
        value.as_scalar_string().ok_or_else(|| {
            ConfigError::type_mismatch(
                path,
                format!("cannot splice a {} into a string", value.kind()),
            )
        })
    }

    /// `${mydate!year!month}` style projection: the resolved value must be
    /// a date (or a marked/parseable date string); the named attributes
    /// are concatenated in order.
    fn project_attributes(
        &self,
        path: &str,
        value: &Value,
        attributes: &str,
    ) -> Result<String, ConfigError> {
        let date = match value {
            Value::Date(date) => date.clone(),
            other => {
                let text = other.as_scalar_string().ok_or_else(|| {
                    ConfigError::type_mismatch(
                        path,
                        format!("cannot project date attributes out of a {}", other.kind()),
                    )
                })?;
                let text = text.replace(self.marker, "");
                Date::parse(text.trim(), self.calendar)?
            }
        };
        let mut out = String::new();
        for attribute in attributes.split('!') {
            out.push_str(&date.attribute(attribute)?);
        }
        Ok(out)
    }
}

/// Dotted-path lookup with the engine's fallback rules: paths whose first
/// segment is not a top-level chapter are rooted at `chapter`, and failed
/// lookups are retried with the first segment replaced by `general`.
/// Returns an owned copy of the value (copy-on-read, no aliasing).
pub fn resolve_dotted(tree: &Map, chapter: &str, dotted: &str) -> Result<Value, ConfigError> {
    let mut segments: Vec<&str> = dotted.split('.').collect();
    if segments.first().is_some_and(|first| !tree.contains_key(*first)) {
        segments.insert(0, chapter);
    }
    if let Some(found) = get_in(tree, &segments) {
        return Ok(found.clone());
    }
    // Second chance: the same path rooted at `general`.
    if segments.first() != Some(&"general") {
        segments[0] = "general";
        if let Some(found) = get_in(tree, &segments) {
            return Ok(found.clone());
        }
    }
    Err(ConfigError::UndefinedKey(dotted.to_string()))
}

fn get_in<'t>(tree: &'t Map, segments: &[&str]) -> Option<&'t Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = tree.get(*first)?;
    for segment in rest {
        current = current.as_map()?.get(*segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::from_yaml_str;

    fn tree(text: &str) -> Map {
        from_yaml_str(text).unwrap().into_map().unwrap()
    }

    fn interpolator<'a>(lookup: &'a Map, gray: &'a GrayList, scope: Scope) -> Interpolator<'a> {
        Interpolator {
            lookup,
            gray,
            scope,
            marker: ">>>THIS_IS_A_DATE<<<",
            calendar: Calendar::ProlepticGregorian,
        }
    }

    #[test]
    fn splices_chapter_relative_variables() {
        let lookup = tree("echam:\n  res: T63\n  out: res_${res}\n");
        let gray = GrayList::empty();
        let it = interpolator(&lookup, &gray, Scope::All);
        assert_eq!(it.interpolate("echam", "res_${res}", 0).unwrap(), "res_T63");
    }

    #[test]
    fn splices_cross_chapter_paths() {
        let lookup = tree("computer:\n  cores: 36\necham:\n  layout: ${computer.cores}x2\n");
        let gray = GrayList::empty();
        let it = interpolator(&lookup, &gray, Scope::All);
        assert_eq!(it.interpolate("echam", "${computer.cores}x2", 0).unwrap(), "36x2");
    }

    #[test]
    fn falls_back_to_general() {
        let lookup = tree("general:\n  expid: PI-CTRL\necham:\n  dir: /work/${expid}\n");
        let gray = GrayList::empty();
        let it = interpolator(&lookup, &gray, Scope::All);
        assert_eq!(it.interpolate("echam", "/work/${expid}", 0).unwrap(), "/work/PI-CTRL");
    }

    #[test]
    fn chained_indirection_resolves() {
        let lookup = tree("general:\n  a: '${b}'\n  b: deep\n");
        let gray = GrayList::empty();
        let it = interpolator(&lookup, &gray, Scope::All);
        assert_eq!(it.interpolate("general", "x=${a}", 0).unwrap(), "x=deep");
    }

    #[test]
    fn self_reference_is_reported_as_cycle() {
        let lookup = tree("general:\n  a: '${a}'\n");
        let gray = GrayList::empty();
        let it = interpolator(&lookup, &gray, Scope::All);
        let err = it.interpolate("general", "${a}", 0).unwrap_err();
        assert!(matches!(err, ConfigError::CyclicDependency(_)));
    }

    #[test]
    fn unknown_variable_is_undefined_key() {
        let lookup = tree("general: {}\n");
        let gray = GrayList::empty();
        let it = interpolator(&lookup, &gray, Scope::All);
        let err = it.interpolate("general", "${nope}", 0).unwrap_err();
        assert!(matches!(err, ConfigError::UndefinedKey(_)));
    }

    #[test]
    fn missing_closer_is_malformed() {
        let lookup = tree("general: {}\n");
        let gray = GrayList::empty();
        let it = interpolator(&lookup, &gray, Scope::All);
        let err = it.interpolate("general", "${open", 0).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedSyntax { .. }));
    }

    #[test]
    fn gray_listed_variables_survive_the_first_pass() {
        let lookup = tree("general:\n  initial_date: '1850-01-01'\n");
        let gray = GrayList::default_rules();
        let first = interpolator(&lookup, &gray, Scope::ExcludeGray);
        assert_eq!(
            first.interpolate("general", "${initial_date}", 0).unwrap(),
            "${initial_date}"
        );
        let last = interpolator(&lookup, &gray, Scope::All);
        assert_eq!(last.interpolate("general", "${initial_date}", 0).unwrap(), "1850-01-01");
    }

    #[test]
    fn date_attribute_projection() {
        let lookup = tree("general:\n  initial_date: '1850-03-07'\n");
        let gray = GrayList::empty();
        let it = interpolator(&lookup, &gray, Scope::All);
        assert_eq!(
            it.interpolate("general", "${initial_date!syear!smonth}", 0).unwrap(),
            "185003"
        );
    }

    #[test]
    fn run_on_keys_renames_entries() {
        let lookup = tree("echam:\n  stream: accw\n  'file_${stream}': out\n");
        let gray = GrayList::empty();
        let it = interpolator(&lookup, &gray, Scope::All);
        let renamed = it.run_on_keys(Value::Map(lookup.clone())).unwrap();
        assert!(renamed.get_path(&["echam", "file_accw"]).is_some());
    }

    #[test]
    fn gray_list_matches_are_anchored() {
        let gray = GrayList::default_rules();
        assert!(gray.matches("initial_date"));
        assert!(gray.matches("choose_lresume"));
        assert!(gray.matches("lresume"));
        assert!(!gray.matches("dates_list"));
        assert!(!gray.matches("resolution"));
    }
}
