//! Storage traits for trails and steps.
//!
//! Any backend (in-memory, document database) implements these to provide
//! persistence. There is no in-process locking anywhere above this seam:
//! the atomic insert-unique and the filtered conditional updates below are
//! the only cross-request coordination, so implementations must guarantee
//! both per operation. Every operation is expected to carry a short
//! bounded timeout; exceeding it surfaces as [`StoreError::Timeout`],
//! never as a silent retry.
//!
//! [`StoreError::Timeout`]: crate::error::StoreError::Timeout

use chrono::{DateTime, Utc};
use serde_json::Value;

use trail_types::{DeviceId, Prn, Rev, Sha256Id, StepId, TrailId};

use crate::error::StoreResult;
use crate::step::{Step, StepProgress, StepStatus};
use crate::trail::Trail;

/// Storage backend for trail documents.
pub trait TrailStore: Send + Sync {
    /// Insert a trail unless its id already exists. Returns `false` on a
    /// duplicate id.
    fn insert_new(&self, trail: &Trail) -> StoreResult<bool>;

    /// Read a trail by id, including garbage-marked ones.
    fn get(&self, id: &TrailId) -> StoreResult<Option<Trail>>;

    /// All non-garbage trails owned by the account, sorted by id.
    fn list_by_owner(&self, owner: &Prn) -> StoreResult<Vec<Trail>>;

    /// The non-garbage trail belonging to the device, if any.
    fn get_by_device(&self, device: &DeviceId) -> StoreResult<Option<Trail>>;

    /// Refresh `last_touched`. Returns `false` if no live trail matched.
    fn touch(&self, id: &TrailId, when: DateTime<Utc>) -> StoreResult<bool>;

    /// Record that the device confirmed a step; sets `last_in_sync` and
    /// `last_touched`.
    fn set_in_sync(&self, id: &TrailId, when: DateTime<Utc>) -> StoreResult<bool>;

    /// Soft-delete a trail. Returns `false` if no live trail matched.
    fn mark_garbage(&self, id: &TrailId) -> StoreResult<bool>;
}

/// Storage backend for step documents.
///
/// The conditional mutations encode the chain's concurrency rules:
/// whichever request reaches the backend first wins, and the loser's
/// filter matches zero documents.
pub trait StepStore: Send + Sync {
    /// Insert a step unless its id already exists. Returns `false` on a
    /// duplicate id — the tie-breaker for concurrent auto-rev appends.
    fn insert_new(&self, step: &Step) -> StoreResult<bool>;

    /// Read a step by id, including garbage-marked ones.
    fn get(&self, id: &StepId) -> StoreResult<Option<Step>>;

    /// Highest revision present for the trail, `None` when it has no steps.
    fn max_rev(&self, trail: &TrailId) -> StoreResult<Option<Rev>>;

    /// Non-garbage steps of a trail in ascending rev order, optionally
    /// filtered by status.
    fn list(&self, trail: &TrailId, status: Option<StepStatus>) -> StoreResult<Vec<Step>>;

    /// Conditional: `{id, device, garbage ≠ true, status = New}` → replace
    /// the progress sub-object and refresh `time_modified`. Returns `false`
    /// when zero documents matched (unknown step and not-your-step alike).
    fn update_progress(
        &self,
        id: &StepId,
        device: &DeviceId,
        progress: &StepProgress,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Conditional: `{id, owner, status = New}` → status `Cancel`. Returns
    /// `false` when zero documents matched.
    fn cancel(&self, id: &StepId, owner: &Prn, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Conditional: `{id, owner, garbage ≠ true, status = New}` → replace
    /// state, hash, and object list. Returns `false` when zero matched.
    fn replace_state(
        &self,
        id: &StepId,
        owner: &Prn,
        state: &Value,
        state_sha: Sha256Id,
        used_objects: &[Sha256Id],
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Conditional: `{id, owner, garbage ≠ true, status = New}` → replace
    /// the commit message. Returns `false` when zero matched.
    fn replace_meta(
        &self,
        id: &StepId,
        owner: &Prn,
        commit_msg: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Overwrite the cached visibility flag.
    fn set_public(&self, id: &StepId, public: bool) -> StoreResult<bool>;

    /// Content hashes referenced by any non-garbage step of the owner.
    /// Reference-counting hook for the external garbage-collection sweep.
    fn used_shas_for_owner(&self, owner: &Prn) -> StoreResult<Vec<Sha256Id>>;

    /// Whether any non-garbage, publicly visible step of the owner
    /// references the sha. Qualifies the owner's object as an autolink
    /// source.
    fn public_step_uses(&self, owner: &Prn, sha: &Sha256Id) -> StoreResult<bool>;
}
