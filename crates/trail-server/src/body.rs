//! Request and response body shapes.
//!
//! Trails and steps serialize in their domain form; the types here cover
//! the request payloads and the object metadata the API adds on top
//! (signed transfer locations, the idempotent-upload conflict flag).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use trail_objects::ObjectRecord;
use trail_types::{RevSpec, Sha256Id};

/// Body of `POST /trails/{id}/steps`.
#[derive(Clone, Debug, Deserialize)]
pub struct AppendStepRequest {
    /// Explicit revision, or any negative value for automatic allocation.
    /// Missing means automatic.
    #[serde(default = "auto_rev")]
    pub rev: i64,
    #[serde(default, rename = "commit-msg")]
    pub commit_msg: String,
    pub state: Value,
}

fn auto_rev() -> i64 {
    -1
}

impl AppendStepRequest {
    pub fn rev_spec(&self) -> RevSpec {
        if self.rev < 0 {
            RevSpec::Auto
        } else {
            RevSpec::At(self.rev as u64)
        }
    }
}

/// Body of `PUT /trails/{id}/steps/{rev}`.
#[derive(Clone, Debug, Deserialize)]
pub struct ReplaceStepRequest {
    #[serde(default, rename = "commit-msg")]
    pub commit_msg: Option<String>,
    pub state: Value,
}

/// Body of `PUT /trails/{id}/steps/{rev}/meta` and the matching GET shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepMeta {
    #[serde(rename = "commit-msg")]
    pub commit_msg: String,
}

/// Body of `POST /trails/{id}/steps/{rev}/objects`.
#[derive(Clone, Debug, Deserialize)]
pub struct ObjectRequest {
    /// Logical name from the referencing state entry.
    #[serde(rename = "objectname")]
    pub object_name: String,
    pub sha: Sha256Id,
    pub size: u64,
}

/// Object metadata as returned by the objects endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectResponse {
    #[serde(rename = "objectname")]
    pub object_name: String,
    pub sha: Sha256Id,
    pub size: u64,
    pub linked: bool,
    /// Set when the object already existed with backing bytes; the request
    /// was an idempotent retry, not an error.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_put_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_get_url: Option<String>,
}

impl ObjectResponse {
    pub fn from_record(record: &ObjectRecord) -> Self {
        Self {
            object_name: record.object_name.clone(),
            sha: record.sha,
            size: record.size,
            linked: record.is_linked(),
            conflict: false,
            signed_put_url: None,
            signed_get_url: None,
        }
    }
}
