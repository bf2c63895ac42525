// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! JSON field-path discovery and resolution.
//!
//! A field path addresses a location inside an arbitrary JSON document using
//! `.` for object descent and `[n]` for array indexing:
//!
//! - `shipment.result`
//! - `shipment.tracking[0].status`
//!
//! Discovery ([`extract_paths`]) walks a courier API response and produces
//! every addressable path in it; resolution ([`get_by_path`]) walks a path
//! back to its value. Both sides share one grammar ([`parse_path`]), which is
//! also what the adapter-module generator emits accessors from, so the two
//! can never drift apart.
//!
//! Everything here is pure and total: malformed paths and missing data
//! degrade to `None` / empty results, never to a panic, because these
//! functions run against untrusted third-party payloads and partially typed
//! user input (live mapping preview).

use serde_json::Value;
use std::collections::BTreeSet;

/// One step of a parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key descent (`.name`).
    Key(String),
    /// Array index (`[0]`). The any-element marker `[]` parses as index 0.
    Index(usize),
}

/// Parse a field path into its segments.
///
/// `"a.b[0].c"` becomes `[Key("a"), Key("b"), Index(0), Key("c")]`. Quoted
/// bracket keys (`a['x-y']`) normalize to plain keys, mirroring how stored
/// mapping paths are written. Empty segments are skipped, so partial input
/// like `"a..b"` or a trailing dot still parses to something resolvable.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let mut rest = part;
        if let Some(open) = rest.find('[') {
            let key = &rest[..open];
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            rest = &rest[open..];
            while rest.starts_with('[') {
                let Some(close) = rest.find(']') else {
                    // Unterminated bracket: keep the text as a key so
                    // resolution degrades instead of erroring.
                    segments.push(PathSegment::Key(rest.to_string()));
                    rest = "";
                    break;
                };
                let inner = &rest[1..close];
                if inner.is_empty() {
                    // `[]` means "first/any element"
                    segments.push(PathSegment::Index(0));
                } else if let Ok(index) = inner.parse::<usize>() {
                    segments.push(PathSegment::Index(index));
                } else {
                    segments.push(PathSegment::Key(
                        inner.trim_matches(|c| c == '\'' || c == '"').to_string(),
                    ));
                }
                rest = &rest[close + 1..];
            }
            if !rest.is_empty() {
                segments.push(PathSegment::Key(rest.to_string()));
            }
        } else {
            segments.push(PathSegment::Key(rest.to_string()));
        }
    }
    segments
}

/// Discover every addressable field path in `value`, lexicographically sorted
/// and duplicate-free.
///
/// Walk rules:
/// - `null` and scalar leaves record their path (a field that exists but is
///   currently null is still mappable);
/// - arrays record their own path, then descend into element `[0]` only,
///   assuming homogeneous elements; empty arrays contribute just their path;
/// - objects descend into every key.
///
/// A top-level normalized error result (`{"error": true, "details": {..}}`)
/// additionally has its `details` object walked under the `details.` prefix,
/// keeping diagnostic fields mappable off failed test calls.
pub fn extract_paths(value: &Value) -> Vec<String> {
    let mut paths = BTreeSet::new();
    walk(value, "", &mut paths);
    if let Value::Object(map) = value
        && map.get("error") == Some(&Value::Bool(true))
        && let Some(details) = map.get("details")
        && details.is_object()
    {
        walk(details, "details", &mut paths);
    }
    paths.into_iter().collect()
}

fn walk(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                walk(child, &path, out);
            }
        }
        Value::Array(items) => {
            // An array of scalars is itself mappable.
            if !prefix.is_empty() {
                out.insert(prefix.to_string());
            }
            if let Some(first) = items.first() {
                walk(first, &format!("{prefix}[0]"), out);
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string());
            }
        }
    }
}

/// Resolve a field path against a JSON value.
///
/// Returns `None` the instant any intermediate value is not the right shape
/// or a key/index is absent. Never panics, for any `value` or `path` — safe
/// to call on partial paths as a user types them. An empty path resolves to
/// the value itself.
pub fn get_by_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in parse_path(path) {
        current = match segment {
            PathSegment::Key(key) => current.as_object()?.get(&key)?,
            PathSegment::Index(index) => current.as_array()?.get(index)?,
        };
    }
    Some(current)
}

/// Dot-separated-only resolution, used for token extraction from auth
/// responses (bracket segments are not part of that phase's grammar).
pub fn get_by_dotted_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in path.split('.') {
        if key.is_empty() {
            continue;
        }
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_input_yields_no_paths() {
        assert!(extract_paths(&Value::Null).is_empty());
        assert!(extract_paths(&json!({})).is_empty());
    }

    #[test]
    fn empty_array_contributes_only_itself() {
        let paths = extract_paths(&json!({"items": []}));
        assert_eq!(paths, vec!["items".to_string()]);
    }

    #[test]
    fn null_fields_are_still_mappable() {
        let paths = extract_paths(&json!({"eta": null, "status": "ok"}));
        assert_eq!(paths, vec!["eta".to_string(), "status".to_string()]);
    }

    #[test]
    fn tracking_response_end_to_end() {
        let value = json!({
            "shipment": {
                "result": "success",
                "tracking": [{"status": "IN-TRANSIT"}]
            }
        });
        let paths = extract_paths(&value);
        assert!(paths.contains(&"shipment.result".to_string()));
        assert!(paths.contains(&"shipment.tracking".to_string()));
        assert!(paths.contains(&"shipment.tracking[0].status".to_string()));
    }

    #[test]
    fn only_first_array_element_is_surfaced() {
        let value = json!({"rows": [{"a": 1}, {"b": 2}, {"c": 3}]});
        let paths = extract_paths(&value);
        assert_eq!(paths, vec!["rows".to_string(), "rows[0].a".to_string()]);
    }

    #[test]
    fn deep_nesting_is_fully_discovered() {
        let value = json!({"a": {"b": {"c": {"d": {"e": {"f": 7}}}}}});
        let paths = extract_paths(&value);
        assert_eq!(paths, vec!["a.b.c.d.e.f".to_string()]);
    }

    #[test]
    fn mixed_scalar_array() {
        let value = json!({"codes": [401, "x", true]});
        let paths = extract_paths(&value);
        assert_eq!(paths, vec!["codes".to_string(), "codes[0]".to_string()]);
    }

    #[test]
    fn error_result_details_remain_mappable() {
        let value = json!({
            "error": true,
            "message": "upstream failed",
            "details": {"reason": "bad docket", "hints": ["check format"]}
        });
        let paths = extract_paths(&value);
        assert!(paths.contains(&"details.reason".to_string()));
        assert!(paths.contains(&"details.hints".to_string()));
        assert!(paths.contains(&"details.hints[0]".to_string()));
        assert!(paths.contains(&"message".to_string()));
    }

    #[test]
    fn every_discovered_path_resolves() {
        let value = json!({
            "a": null,
            "b": [1, 2],
            "c": {"d": [{"e": "x"}], "f": false},
            "g": []
        });
        for path in extract_paths(&value) {
            assert!(
                get_by_path(&value, &path).is_some(),
                "path {path:?} did not resolve"
            );
        }
    }

    #[test]
    fn get_by_path_never_panics_on_garbage() {
        let value = json!({"a": {"b": [1]}});
        for path in ["", ".", "a..b", "a.b[", "a.b[zz]", "x.y.z", "a.b[5]", "a.b[0].q"] {
            let _ = get_by_path(&value, path);
        }
        assert_eq!(get_by_path(&value, "a.b[0]"), Some(&json!(1)));
        assert_eq!(get_by_path(&value, "a.b[1]"), None);
        assert_eq!(get_by_path(&Value::Null, "a"), None);
    }

    #[test]
    fn empty_bracket_is_first_element() {
        let value = json!({"rows": [{"id": 9}]});
        assert_eq!(get_by_path(&value, "rows[].id"), Some(&json!(9)));
        assert_eq!(get_by_path(&value, "rows[0].id"), Some(&json!(9)));
    }

    #[test]
    fn quoted_bracket_keys_normalize() {
        let value = json!({"headers": {"x-request-id": "r1"}});
        assert_eq!(
            get_by_path(&value, "headers['x-request-id']"),
            Some(&json!("r1"))
        );
    }

    #[test]
    fn top_level_array_paths() {
        let value = json!([{"id": 1}]);
        let paths = extract_paths(&value);
        assert_eq!(paths, vec!["[0].id".to_string()]);
        assert_eq!(get_by_path(&value, "[0].id"), Some(&json!(1)));
    }

    #[test]
    fn parse_path_segments() {
        assert_eq!(
            parse_path("a.b[0].c"),
            vec![
                PathSegment::Key("a".into()),
                PathSegment::Key("b".into()),
                PathSegment::Index(0),
                PathSegment::Key("c".into()),
            ]
        );
        assert_eq!(parse_path("b[]"), vec![
            PathSegment::Key("b".into()),
            PathSegment::Index(0)
        ]);
    }

    #[test]
    fn dotted_only_resolution_ignores_brackets() {
        let value = json!({"data": {"access_token": "t"}});
        assert_eq!(
            get_by_dotted_path(&value, "data.access_token"),
            Some(&json!("t"))
        );
        assert_eq!(get_by_dotted_path(&value, "data.missing"), None);
    }
}
