//! Revision resolution and export composition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use trail_chain::StepChain;
use trail_codec::{canonical_bytes, extract_object_refs};
use trail_objects::{ObjectIndex, ObjectStore};
use trail_types::{Rev, RevSelector, Sha256Id, TrailId};

use crate::error::{ExportError, ExportResult};

/// One object carried by an export, in archive order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Logical name from the referencing state entry; doubles as the
    /// archive member path.
    pub name: String,
    pub sha: Sha256Id,
    pub size: u64,
    /// Where the payload bytes live (the link target for linked records).
    pub storage_id: Sha256Id,
}

/// A resolved point-in-time export of one revision.
#[derive(Clone, Debug)]
pub struct Export {
    pub trail: TrailId,
    pub rev: Rev,
    /// Canonical encoding of the (optionally filtered) state.
    pub canonical_state: Vec<u8>,
    /// Referenced objects, sorted by logical name.
    pub objects: Vec<ObjectEntry>,
    /// The step's modification time; pins every archive timestamp.
    pub mod_time: DateTime<Utc>,
}

/// Assembles exports from the chain and object store read paths.
pub struct ExportAssembler {
    chain: Arc<StepChain>,
    objects: Arc<ObjectStore>,
}

impl ExportAssembler {
    pub fn new(chain: Arc<StepChain>, objects: Arc<ObjectStore>) -> Self {
        Self { chain, objects }
    }

    /// Resolve a revision and compose its export.
    ///
    /// `name_filter` is a `/`-joined field path; when given, only the
    /// state subtree under that path survives, and the object list shrinks
    /// to what the filtered state still references. The canonical encoding
    /// is recomputed from the filtered tree, so identical inputs always
    /// produce identical bytes.
    pub fn assemble(
        &self,
        trail: &TrailId,
        selector: RevSelector,
        name_filter: Option<&str>,
    ) -> ExportResult<Export> {
        let step = self.chain.step_at(trail, selector)?;

        let state = match name_filter {
            Some(path) => filter_state(&step.state, path),
            None => step.state.clone(),
        };
        let canonical_state = canonical_bytes(&state)?;

        let refs = extract_object_refs(&state);
        let mut objects = Vec::with_capacity(refs.len());
        for object_ref in refs {
            let record = self
                .objects
                .index()
                .get(&step.owner, &object_ref.sha)?
                .ok_or_else(|| ExportError::MissingObject {
                    name: object_ref.name.clone(),
                    sha: object_ref.sha,
                })?;
            objects.push(ObjectEntry {
                name: object_ref.name,
                sha: object_ref.sha,
                size: record.size,
                storage_id: record.backing_storage_id(),
            });
        }

        debug!(
            trail = %trail,
            rev = step.rev,
            objects = objects.len(),
            "export assembled"
        );
        Ok(Export {
            trail: trail.clone(),
            rev: step.rev,
            canonical_state,
            objects,
            mod_time: step.time_modified,
        })
    }
}

/// Retain only the state subtree addressed by a `/`-joined field path.
///
/// Entries outside the path disappear; the enclosing object structure down
/// to the selected subtree is preserved so object names keep their full
/// key paths. An unmatched path yields an empty object.
fn filter_state(state: &Value, path: &str) -> Value {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return state.clone();
    }
    prune(state, &segments)
}

fn prune(value: &Value, segments: &[&str]) -> Value {
    let Some((head, rest)) = segments.split_first() else {
        return value.clone();
    };
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            if let Some(child) = map.get(*head) {
                let kept = prune(child, rest);
                if !is_empty_object(&kept) || rest.is_empty() {
                    out.insert((*head).to_string(), kept);
                }
            }
            Value::Object(out)
        }
        _ => Value::Object(Map::new()),
    }
}

fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}
