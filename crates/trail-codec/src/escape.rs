//! Reversible key escaping for the backing document store.
//!
//! The document store forbids `.` anywhere in a map key and `$` at the
//! start of one. Keys are rewritten before persistence and restored on
//! every read; callers never observe the escaped form.
//!
//! The transform uses `~` as the escape lead-in:
//!
//! - `~` → `~~`
//! - `.` → `~p`
//! - leading `$` → `~s`
//!
//! Escaping `~` first makes the scheme total: an original key can never
//! collide with an escaped one, and [`unescape_key`] is its exact inverse.

use serde_json::{Map, Value};

use crate::error::{CodecError, CodecResult};

/// Escape a single map key.
pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, c) in key.chars().enumerate() {
        match c {
            '~' => out.push_str("~~"),
            '.' => out.push_str("~p"),
            '$' if i == 0 => out.push_str("~s"),
            other => out.push(other),
        }
    }
    out
}

/// Invert [`escape_key`]. Fails on malformed escape sequences, which only
/// occur if the persisted document was written by something else.
pub fn unescape_key(key: &str) -> CodecResult<String> {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('~') => out.push('~'),
            Some('p') => out.push('.'),
            Some('s') => out.push('$'),
            _ => {
                return Err(CodecError::BadEscape {
                    key: key.to_string(),
                })
            }
        }
    }
    Ok(out)
}

/// Recursively escape every object key in a tree.
pub fn escape_keys(tree: &Value) -> Value {
    match tree {
        Value::Object(map) => {
            let mut escaped = Map::with_capacity(map.len());
            for (key, value) in map {
                escaped.insert(escape_key(key), escape_keys(value));
            }
            Value::Object(escaped)
        }
        Value::Array(items) => Value::Array(items.iter().map(escape_keys).collect()),
        other => other.clone(),
    }
}

/// Recursively restore every object key in a persisted tree.
pub fn unescape_keys(tree: &Value) -> CodecResult<Value> {
    match tree {
        Value::Object(map) => {
            let mut restored = Map::with_capacity(map.len());
            for (key, value) in map {
                restored.insert(unescape_key(key)?, unescape_keys(value)?);
            }
            Ok(Value::Object(restored))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(unescape_keys)
                .collect::<CodecResult<Vec<_>>>()?,
        )),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn dots_are_rewritten() {
        assert_eq!(escape_key("app.config.json"), "app~pconfig~pjson");
    }

    #[test]
    fn leading_dollar_is_rewritten() {
        assert_eq!(escape_key("$set"), "~sset");
        // A non-leading dollar is legal and untouched.
        assert_eq!(escape_key("pre$set"), "pre$set");
    }

    #[test]
    fn tilde_is_doubled() {
        assert_eq!(escape_key("a~b"), "a~~b");
        assert_eq!(unescape_key("a~~b").unwrap(), "a~b");
    }

    #[test]
    fn escaped_form_is_store_safe() {
        for key in ["$lead", "a.b.c", "~p", "$~."] {
            let escaped = escape_key(key);
            assert!(!escaped.contains('.'), "dot left in {escaped:?}");
            assert!(!escaped.starts_with('$'), "leading $ left in {escaped:?}");
        }
    }

    #[test]
    fn unescape_rejects_dangling_escape() {
        assert!(unescape_key("broken~").is_err());
        assert!(unescape_key("bad~x").is_err());
    }

    #[test]
    fn tree_roundtrip_with_nasty_keys() {
        let tree = json!({
            "$lead": 1,
            "app.json": {"inner.key": true, "~already": null},
            "list": [{"a.b": "c"}]
        });
        let escaped = escape_keys(&tree);
        let restored = unescape_keys(&escaped).unwrap();
        assert_eq!(restored, tree);
    }

    proptest! {
        #[test]
        fn escape_roundtrip_is_lossless(key in "\\PC{0,24}") {
            let escaped = escape_key(&key);
            prop_assert!(!escaped.contains('.'));
            prop_assert!(!escaped.starts_with('$'));
            prop_assert_eq!(unescape_key(&escaped).unwrap(), key);
        }
    }
}
