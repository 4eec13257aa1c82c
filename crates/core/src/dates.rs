//! Date marking, `$((...))` arithmetic, and final scalar coercion.
//!
//! Dates travel through interpolation as strings. To keep them from being
//! mangled by coercion or partial evaluation, any scalar under a key
//! ending in `date` gets an internal marker token appended before
//! interpolation runs. After interpolation, `$((...))` segments are
//! evaluated (marked operands parse as calendar dates, `+`/`-` apply
//! field-wise offsets), then a single unmark pass strips the marker and
//! materialises date-keyed strings into [`Date`] values or `!attribute`
//! projections.

use crate::calendar::{Calendar, Date};
use crate::error::ConfigError;
use crate::value::Value;
use crate::walker;

/// Sentinel appended to date-keyed scalars while interpolation runs.
pub const DATE_MARKER: &str = ">>>THIS_IS_A_DATE<<<";

/// Append `marker` to every scalar whose key ends in `date`. Values still
/// carrying `${...}` are left alone so the marker cannot end up inside a
/// substituted variable.
pub fn mark(tree: Value, marker: &str) -> Result<Value, ConfigError> {
    walker::map_leaves(tree, &mut |path, leaf| {
        let is_date_key = path.last().is_some_and(|key| key.ends_with("date"));
        if !is_date_key {
            return Ok(leaf);
        }
        match leaf.as_scalar_string() {
            Some(text) if !text.contains("${") && !text.contains(marker) => {
                Ok(Value::Str(format!("{text}{marker}")))
            }
            _ => Ok(leaf),
        }
    })
}

/// Evaluate every `$(( ... ))` segment in string leaves. Leaves still
/// carrying `${...}` are skipped; a later pass revisits them.
pub fn evaluate(tree: Value, marker: &str, calendar: Calendar) -> Result<Value, ConfigError> {
    walker::map_leaves(tree, &mut |_, leaf| match leaf {
        Value::Str(text) if text.contains("$((") && !text.contains("${") => {
            Ok(Value::Str(evaluate_string(&text, marker, calendar)?))
        }
        other => Ok(other),
    })
}

fn evaluate_string(input: &str, marker: &str, calendar: Calendar) -> Result<String, ConfigError> {
    let mut text = input.to_string();
    // Innermost segment first: the first `))` past an opener, paired with
    // the last `$((` before it.
    while let Some(first_open) = text.find("$((") {
        let close = match text[first_open..].find("))") {
            Some(offset) => first_open + offset,
            None => return Err(ConfigError::malformed(input, "))")),
        };
        let open = text[..close].rfind("$((").unwrap_or(first_open);
        let segment = &text[open + 3..close];
        let result = evaluate_segment(segment, marker, calendar)?;
        text = format!("{}{}{}", &text[..open], result, &text[close + 2..]);
    }
    Ok(text.trim().to_string())
}

/// One `+`/`-` chain. Marked operands are calendar dates; the first date
/// anchors the chain and later dates act as field offsets. A chain without
/// dates is plain numeric arithmetic.
fn evaluate_segment(
    segment: &str,
    marker: &str,
    calendar: Calendar,
) -> Result<String, ConfigError> {
    let tokens: Vec<&str> = segment.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(ConfigError::malformed(segment, "an operand"));
    }
    if segment.contains(marker) {
        evaluate_dates(&tokens, marker, calendar)
    } else {
        evaluate_numbers(&tokens, segment)
    }
}

fn evaluate_dates(
    tokens: &[&str],
    marker: &str,
    calendar: Calendar,
) -> Result<String, ConfigError> {
    let mut result: Option<Date> = None;
    let mut pending_op = '+';
    for token in tokens {
        match *token {
            "+" => pending_op = '+',
            "-" => pending_op = '-',
            operand => {
                let date = Date::parse(&operand.replace(marker, ""), calendar)?;
                result = Some(match result {
                    None => date,
                    Some(anchor) if pending_op == '+' => anchor.add(date.as_delta()),
                    Some(anchor) => anchor.sub(date.as_delta()),
                });
            }
        }
    }
    let result =
        result.ok_or_else(|| ConfigError::malformed(tokens.join(" "), "a date operand"))?;
    Ok(result.output())
}

fn evaluate_numbers(tokens: &[&str], segment: &str) -> Result<String, ConfigError> {
    let mut total = 0f64;
    let mut all_integral = true;
    let mut pending_op = '+';
    let mut seen_operand = false;
    for token in tokens {
        match *token {
            "+" => pending_op = '+',
            "-" => pending_op = '-',
            operand => {
                let number: f64 = operand.parse().map_err(|_| {
                    ConfigError::malformed(segment, "a numeric or date operand")
                })?;
                all_integral &= operand.parse::<i64>().is_ok();
                if pending_op == '+' {
                    total += number;
                } else {
                    total -= number;
                }
                seen_operand = true;
            }
        }
    }
    if !seen_operand {
        return Err(ConfigError::malformed(segment, "an operand"));
    }
    if all_integral {
        Ok(format!("{}", total as i64))
    } else {
        Ok(format!("{total}"))
    }
}

/// Strip the marker everywhere and materialise date-keyed strings: with
/// `!attribute` suffixes the projected attributes are concatenated,
/// otherwise the string becomes a [`Value::Date`].
pub fn unmark_and_materialise(
    tree: Value,
    marker: &str,
    calendar: Calendar,
) -> Result<Value, ConfigError> {
    walker::map_leaves(tree, &mut |path, leaf| {
        let Value::Str(text) = leaf else {
            return Ok(leaf);
        };
        let stripped =
            if text.contains(marker) { text.replace(marker, "") } else { text };
        let is_date_key = path.last().is_some_and(|key| key.ends_with("date"));
        if !is_date_key || stripped.contains("${") {
            return Ok(Value::Str(stripped));
        }
        // Arithmetic results arrive here without a marker; anything under
        // a date key that parses as a date is materialised, the rest is
        // left as-is.
        match stripped.split_once('!') {
            Some((date_text, attributes)) => {
                let Ok(date) = Date::parse(date_text.trim(), calendar) else {
                    return Ok(Value::Str(stripped));
                };
                let mut out = String::new();
                for attribute in attributes.split('!') {
                    out.push_str(&date.attribute(attribute)?);
                }
                Ok(Value::Str(out))
            }
            None => match Date::parse(stripped.trim(), calendar) {
                Ok(date) => Ok(Value::Date(date)),
                Err(_) => Ok(Value::Str(stripped)),
            },
        }
    })
}

/// Final coercion: bare strings with boolean/integer/float lexical forms
/// become typed scalars. Leading-zero digit strings are left alone, they
/// are almost always identifiers or padded date fragments.
pub fn coerce_scalars(tree: Value) -> Result<Value, ConfigError> {
    walker::map_leaves(tree, &mut |_, leaf| {
        let Value::Str(text) = leaf else {
            return Ok(leaf);
        };
        Ok(coerce_one(text))
    })
}

fn coerce_one(text: String) -> Value {
    match text.as_str() {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        _ => {}
    }
    if has_leading_zero(&text) {
        return Value::Str(text);
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::Int(int);
    }
    if looks_like_float(&text) {
        if let Ok(float) = text.parse::<f64>() {
            return Value::Float(float);
        }
    }
    Value::Str(text)
}

fn has_leading_zero(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.")
}

fn looks_like_float(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    !body.is_empty()
        && body.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '.')
        && body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-')
        && (body.contains('.') || body.contains(['e', 'E']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::from_yaml_str;

    const CAL: Calendar = Calendar::NoLeap;

    #[test]
    fn mark_targets_date_keys_only() {
        let tree = from_yaml_str("general:\n  initial_date: 18500101\n  expid: test\n").unwrap();
        let marked = mark(tree, DATE_MARKER).unwrap();
        assert_eq!(
            marked.get_path(&["general", "initial_date"]).unwrap().as_str(),
            Some(format!("18500101{DATE_MARKER}").as_str())
        );
        assert_eq!(marked.get_path(&["general", "expid"]).unwrap().as_str(), Some("test"));
    }

    #[test]
    fn mark_skips_unresolved_variables() {
        let tree = from_yaml_str("general:\n  end_date: '${initial_date}'\n").unwrap();
        let marked = mark(tree, DATE_MARKER).unwrap();
        assert_eq!(
            marked.get_path(&["general", "end_date"]).unwrap().as_str(),
            Some("${initial_date}")
        );
    }

    #[test]
    fn one_year_no_leap_round_trip() {
        let text = format!("$(( 18500101{DATE_MARKER} + 00010000{DATE_MARKER} ))");
        assert_eq!(evaluate_string(&text, DATE_MARKER, CAL).unwrap(), "18510101");
    }

    #[test]
    fn date_minus_offset() {
        let text = format!("$(( 18500101{DATE_MARKER} - 00000001{DATE_MARKER} ))");
        assert_eq!(evaluate_string(&text, DATE_MARKER, CAL).unwrap(), "18491231");
    }

    #[test]
    fn numeric_chains_evaluate() {
        assert_eq!(evaluate_string("$(( 3 + 4 - 1 ))", DATE_MARKER, CAL).unwrap(), "6");
        assert_eq!(evaluate_string("$(( 1.5 + 1 ))", DATE_MARKER, CAL).unwrap(), "2.5");
    }

    #[test]
    fn surrounding_text_is_preserved() {
        let out = evaluate_string("run_$(( 2 + 3 ))_steps", DATE_MARKER, CAL).unwrap();
        assert_eq!(out, "run_5_steps");
    }

    #[test]
    fn unmark_materialises_date_values() {
        let tree = from_yaml_str("general: {}\n").unwrap();
        let mut map = tree.into_map().unwrap();
        map.get_mut("general").unwrap().as_map_mut().unwrap().insert(
            "initial_date".into(),
            Value::Str(format!("1850-01-01{DATE_MARKER}")),
        );
        let out = unmark_and_materialise(Value::Map(map), DATE_MARKER, CAL).unwrap();
        match out.get_path(&["general", "initial_date"]).unwrap() {
            Value::Date(date) => assert_eq!(date.attribute("year").unwrap(), "1850"),
            other => panic!("expected a date, got {other:?}"),
        }
    }

    #[test]
    fn unmark_projects_attributes() {
        let mut map = from_yaml_str("general: {}\n").unwrap().into_map().unwrap();
        map.get_mut("general").unwrap().as_map_mut().unwrap().insert(
            "start_date".into(),
            Value::Str(format!("18500101{DATE_MARKER}!syear!smonth")),
        );
        let out = unmark_and_materialise(Value::Map(map), DATE_MARKER, CAL).unwrap();
        assert_eq!(out.get_path(&["general", "start_date"]).unwrap().as_str(), Some("185001"));
    }

    #[test]
    fn unmark_leaves_non_date_keys_as_strings() {
        let mut map = from_yaml_str("general: {}\n").unwrap().into_map().unwrap();
        map.get_mut("general").unwrap().as_map_mut().unwrap().insert(
            "label".into(),
            Value::Str(format!("run-18500101{DATE_MARKER}")),
        );
        let out = unmark_and_materialise(Value::Map(map), DATE_MARKER, CAL).unwrap();
        assert_eq!(out.get_path(&["general", "label"]).unwrap().as_str(), Some("run-18500101"));
    }

    #[test]
    fn coercion_types_remaining_strings() {
        let tree = from_yaml_str(
            "general:\n  a: 'true'\n  b: '42'\n  c: '2.5'\n  d: hello\n  e: '007'\n",
        )
        .unwrap();
        let out = coerce_scalars(tree).unwrap();
        assert_eq!(out.get_path(&["general", "a"]), Some(&Value::Bool(true)));
        assert_eq!(out.get_path(&["general", "b"]), Some(&Value::Int(42)));
        assert_eq!(out.get_path(&["general", "c"]), Some(&Value::Float(2.5)));
        assert_eq!(out.get_path(&["general", "d"]).unwrap().as_str(), Some("hello"));
        assert_eq!(out.get_path(&["general", "e"]).unwrap().as_str(), Some("007"));
    }
}
