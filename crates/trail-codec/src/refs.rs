//! Object references carried inside a state tree.
//!
//! Device state maps logical names to either inline JSON documents or the
//! SHA-256 of a binary payload held in the object store. An entry counts as
//! an object reference when its value is exactly 64 lowercase hex
//! characters, unless the key starts with `#` (spec metadata such as
//! `#spec`) or ends with `.json` (inline document whose value merely looks
//! like a hash).

use serde_json::Value;

use trail_types::Sha256Id;

/// One object reference found in a state tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    /// Logical name: the `/`-joined key path to the referencing entry.
    pub name: String,
    /// Content hash of the referenced payload.
    pub sha: Sha256Id,
}

/// Extract all object references from a state tree, sorted by name.
pub fn extract_object_refs(tree: &Value) -> Vec<ObjectRef> {
    let mut refs = Vec::new();
    walk(tree, &mut Vec::new(), &mut refs);
    refs.sort_by(|a, b| a.name.cmp(&b.name));
    refs
}

fn walk(value: &Value, path: &mut Vec<String>, refs: &mut Vec<ObjectRef>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.starts_with('#') {
                    continue;
                }
                if let Value::String(s) = child {
                    if !key.ends_with(".json") && Sha256Id::is_hex(s) {
                        if let Ok(sha) = Sha256Id::from_hex(s) {
                            let mut name = path.join("/");
                            if !name.is_empty() {
                                name.push('/');
                            }
                            name.push_str(key);
                            refs.push(ObjectRef { name, sha });
                        }
                        continue;
                    }
                }
                path.push(key.clone());
                walk(child, path, refs);
                path.pop();
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, path, refs);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sha_hex(seed: &[u8]) -> String {
        Sha256Id::digest(seed).to_hex()
    }

    #[test]
    fn top_level_references_are_found() {
        let kernel = sha_hex(b"kernel");
        let rootfs = sha_hex(b"rootfs");
        let tree = json!({
            "kernel.img": kernel,
            "rootfs.squashfs": rootfs,
            "config.json": {"threads": 4}
        });
        let refs = extract_object_refs(&tree);
        assert_eq!(refs.len(), 2);
        // Sorted by name.
        assert_eq!(refs[0].name, "kernel.img");
        assert_eq!(refs[0].sha.to_hex(), kernel);
        assert_eq!(refs[1].name, "rootfs.squashfs");
    }

    #[test]
    fn nested_references_join_the_key_path() {
        let sha = sha_hex(b"blob");
        let tree = json!({"bsp": {"firmware": {"wifi.bin": sha}}});
        let refs = extract_object_refs(&tree);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "bsp/firmware/wifi.bin");
    }

    #[test]
    fn metadata_and_inline_json_are_skipped() {
        let sha = sha_hex(b"x");
        let tree = json!({
            "#spec": "device-config@1",
            "notes.json": sha,
            "real.bin": sha
        });
        let refs = extract_object_refs(&tree);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "real.bin");
    }

    #[test]
    fn non_hash_strings_are_ignored() {
        let tree = json!({
            "short": "abcd",
            "upper": sha_hex(b"y").to_uppercase(),
            "numeric": 42
        });
        assert!(extract_object_refs(&tree).is_empty());
    }

    #[test]
    fn empty_state_has_no_references() {
        assert!(extract_object_refs(&json!({})).is_empty());
    }
}
