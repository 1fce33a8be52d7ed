use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use trail_types::{DeviceId, Prn, Rev, Sha256Id, StepId, TrailId};

/// Progress status of one step.
///
/// `New` is the single non-terminal status: the owner may still cancel or
/// rewrite the step, and the device still owes its result. Every other
/// status is terminal from the chain's point of view; a terminal step is
/// never matched again by a cancel or a progress update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    New,
    Done,
    Cancel,
    Error,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::New)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Done => write!(f, "DONE"),
            Self::Cancel => write!(f, "CANCEL"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Device-reported progress of one step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepProgress {
    pub status: StepStatus,
    /// Completion percentage, 0–100.
    pub progress: u8,
    #[serde(default)]
    pub status_msg: String,
    #[serde(default)]
    pub log: String,
    /// Opaque device payload; the chain never interprets it.
    #[serde(default)]
    pub data: Value,
    /// Per-object download percentage, keyed by object name.
    #[serde(default)]
    pub downloads: BTreeMap<String, u8>,
}

impl StepProgress {
    /// Progress of a freshly appended step: `New`, nothing reported.
    pub fn pending() -> Self {
        Self {
            status: StepStatus::New,
            progress: 0,
            status_msg: String::new(),
            log: String::new(),
            data: Value::Null,
            downloads: BTreeMap::new(),
        }
    }

    /// Progress of a factory-baseline step: `Done` at creation.
    pub fn baseline() -> Self {
        Self {
            status: StepStatus::Done,
            progress: 100,
            status_msg: "factory state".to_string(),
            log: String::new(),
            data: Value::Null,
            downloads: BTreeMap::new(),
        }
    }
}

impl Default for StepProgress {
    fn default() -> Self {
        Self::pending()
    }
}

/// One immutable revision in a trail's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub trail: TrailId,
    pub owner: Prn,
    pub device: DeviceId,
    pub rev: Rev,
    #[serde(default)]
    pub commit_msg: String,
    /// Configuration state tree. Persisted with escaped keys; callers of
    /// the chain always see the unescaped form.
    pub state: Value,
    /// Hash over the canonical encoding of `state`, computed before any
    /// key escaping.
    pub state_sha: Sha256Id,
    pub progress: StepProgress,
    /// Content hashes of the objects `state` references.
    pub used_objects: Vec<Sha256Id>,
    /// Cached visibility flag, recomputed from the owning device whenever
    /// the step is written. Never user-settable.
    pub is_public: bool,
    pub time_created: DateTime<Utc>,
    pub time_modified: DateTime<Utc>,
    #[serde(default)]
    pub garbage: bool,
}

impl Step {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trail: TrailId,
        owner: Prn,
        device: DeviceId,
        rev: Rev,
        commit_msg: &str,
        state: Value,
        state_sha: Sha256Id,
        used_objects: Vec<Sha256Id>,
        progress: StepProgress,
        is_public: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StepId::new(trail.clone(), rev),
            trail,
            owner,
            device,
            rev,
            commit_msg: commit_msg.to_string(),
            state,
            state_sha,
            progress,
            used_objects,
            is_public,
            time_created: now,
            time_modified: now,
            garbage: false,
        }
    }
}
