//! Tree merging.
//!
//! Two flavours are needed: the priority merge used to layer the user,
//! setup and model trees (the preferred side always wins on conflict), and
//! the plain recursive merge used when a selected choose branch is folded
//! into its chapter (the incoming side wins).

use crate::value::{Map, Value};

/// Merge `other` under `preferred`, recursively, with `preferred` winning
/// every conflict. Keys only present in `other` are copied in.
pub fn priority_merge(mut preferred: Map, other: Map) -> Map {
    for (key, value) in other {
        match preferred.get_mut(&key) {
            None => {
                preferred.insert(key, value);
            }
            Some(Value::Map(have)) => {
                if let Value::Map(incoming) = value {
                    let merged = priority_merge(std::mem::take(have), incoming);
                    *have = merged;
                }
            }
            // Conflicting scalar or sequence: the preferred side stays.
            Some(_) => {}
        }
    }
    preferred
}

/// Merge `incoming` into `target`, recursively, with `incoming` winning
/// every conflict.
pub fn dict_merge(target: &mut Map, incoming: Map) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Map(existing)), Value::Map(update)) => {
                dict_merge(existing, update);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::from_yaml_str;

    fn map(text: &str) -> Map {
        from_yaml_str(text).unwrap().into_map().unwrap()
    }

    #[test]
    fn priority_merge_prefers_first() {
        let user = map("echam:\n  res: T63\n");
        let setup = map("echam:\n  res: T31\n  nproc: 12\n");
        let merged = priority_merge(user, setup);
        assert_eq!(merged["echam"].get_path(&["res"]).unwrap().as_str(), Some("T63"));
        assert_eq!(merged["echam"].get_path(&["nproc"]), Some(&Value::Int(12)));
    }

    #[test]
    fn priority_merge_is_idempotent() {
        let a = map("a:\n  x: 1\nb: keep\n");
        let b = map("a:\n  x: 2\n  y: 3\nc: new\n");
        let once = priority_merge(a.clone(), b.clone());
        let twice = priority_merge(once.clone(), b);
        assert_eq!(once, twice);
    }

    #[test]
    fn priority_merge_keeps_scalar_over_map() {
        let a = map("opt: flat\n");
        let b = map("opt:\n  nested: true\n");
        let merged = priority_merge(a, b);
        assert_eq!(merged["opt"].as_str(), Some("flat"));
    }

    #[test]
    fn dict_merge_overwrites() {
        let mut target = map("res: T31\nnest:\n  a: 1\n");
        dict_merge(&mut target, map("res: T63\nnest:\n  b: 2\n"));
        assert_eq!(target["res"].as_str(), Some("T63"));
        assert_eq!(target["nest"].get_path(&["a"]), Some(&Value::Int(1)));
        assert_eq!(target["nest"].get_path(&["b"]), Some(&Value::Int(2)));
    }
}
