//! Canonical JSON encoding and the state hash derived from it.
//!
//! The canonical form is insertion-order independent: object keys are
//! emitted in lexicographic byte order at every nesting level, with no
//! whitespace. Two semantically identical trees therefore encode to the
//! same bytes and hash to the same [`Sha256Id`], regardless of how the
//! trees were constructed.

use serde_json::Value;

use trail_types::Sha256Id;

use crate::error::{CodecError, CodecResult};

/// Produce the byte-stable canonical encoding of a JSON tree.
pub fn canonical_bytes(tree: &Value) -> CodecResult<Vec<u8>> {
    let mut out = Vec::with_capacity(128);
    write_value(tree, &mut out)?;
    Ok(out)
}

/// The SHA-256 content hash over the canonical encoding.
///
/// Always computed over the unescaped form, before any key transform for
/// persistence.
pub fn state_sha(tree: &Value) -> CodecResult<Sha256Id> {
    Ok(Sha256Id::digest(&canonical_bytes(tree)?))
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> CodecResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(s, out)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out)?;
                out.push(b':');
                write_value(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) -> CodecResult<()> {
    let encoded = serde_json::to_vec(s).map_err(|e| CodecError::Serialization(e.to_string()))?;
    out.extend_from_slice(&encoded);
    Ok(())
}
