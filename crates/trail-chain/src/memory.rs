//! In-memory trail and step stores for tests and embedding.
//!
//! All documents live in `HashMap`s behind `RwLock`s. Holding the write
//! lock across a whole conditional update gives the same atomicity a real
//! document store provides per single-document operation.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value;

use trail_types::{DeviceId, Prn, Rev, Sha256Id, StepId, TrailId};

use crate::error::StoreResult;
use crate::step::{Step, StepProgress, StepStatus};
use crate::traits::{StepStore, TrailStore};
use crate::trail::Trail;

/// In-memory implementation of [`TrailStore`].
pub struct InMemoryTrailStore {
    trails: RwLock<HashMap<TrailId, Trail>>,
}

impl InMemoryTrailStore {
    pub fn new() -> Self {
        Self {
            trails: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.trails.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryTrailStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrailStore for InMemoryTrailStore {
    fn insert_new(&self, trail: &Trail) -> StoreResult<bool> {
        let mut map = self.trails.write().expect("lock poisoned");
        if map.contains_key(&trail.id) {
            return Ok(false);
        }
        map.insert(trail.id.clone(), trail.clone());
        Ok(true)
    }

    fn get(&self, id: &TrailId) -> StoreResult<Option<Trail>> {
        let map = self.trails.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn list_by_owner(&self, owner: &Prn) -> StoreResult<Vec<Trail>> {
        let map = self.trails.read().expect("lock poisoned");
        let mut trails: Vec<Trail> = map
            .values()
            .filter(|t| &t.owner == owner && !t.garbage)
            .cloned()
            .collect();
        trails.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(trails)
    }

    fn get_by_device(&self, device: &DeviceId) -> StoreResult<Option<Trail>> {
        let map = self.trails.read().expect("lock poisoned");
        Ok(map
            .values()
            .find(|t| &t.device == device && !t.garbage)
            .cloned())
    }

    fn touch(&self, id: &TrailId, when: DateTime<Utc>) -> StoreResult<bool> {
        let mut map = self.trails.write().expect("lock poisoned");
        match map.get_mut(id) {
            Some(trail) if !trail.garbage => {
                trail.last_touched = when;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_in_sync(&self, id: &TrailId, when: DateTime<Utc>) -> StoreResult<bool> {
        let mut map = self.trails.write().expect("lock poisoned");
        match map.get_mut(id) {
            Some(trail) if !trail.garbage => {
                trail.last_in_sync = Some(when);
                trail.last_touched = when;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn mark_garbage(&self, id: &TrailId) -> StoreResult<bool> {
        let mut map = self.trails.write().expect("lock poisoned");
        match map.get_mut(id) {
            Some(trail) if !trail.garbage => {
                trail.garbage = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl std::fmt::Debug for InMemoryTrailStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTrailStore")
            .field("trail_count", &self.len())
            .finish()
    }
}

/// In-memory implementation of [`StepStore`].
pub struct InMemoryStepStore {
    steps: RwLock<HashMap<StepId, Step>>,
}

impl InMemoryStepStore {
    pub fn new() -> Self {
        Self {
            steps: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryStepStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StepStore for InMemoryStepStore {
    fn insert_new(&self, step: &Step) -> StoreResult<bool> {
        let mut map = self.steps.write().expect("lock poisoned");
        if map.contains_key(&step.id) {
            return Ok(false);
        }
        map.insert(step.id.clone(), step.clone());
        Ok(true)
    }

    fn get(&self, id: &StepId) -> StoreResult<Option<Step>> {
        let map = self.steps.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn max_rev(&self, trail: &TrailId) -> StoreResult<Option<Rev>> {
        let map = self.steps.read().expect("lock poisoned");
        Ok(map
            .values()
            .filter(|s| &s.trail == trail && !s.garbage)
            .map(|s| s.rev)
            .max())
    }

    fn list(&self, trail: &TrailId, status: Option<StepStatus>) -> StoreResult<Vec<Step>> {
        let map = self.steps.read().expect("lock poisoned");
        let mut steps: Vec<Step> = map
            .values()
            .filter(|s| &s.trail == trail && !s.garbage)
            .filter(|s| status.map_or(true, |wanted| s.progress.status == wanted))
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.rev);
        Ok(steps)
    }

    fn update_progress(
        &self,
        id: &StepId,
        device: &DeviceId,
        progress: &StepProgress,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut map = self.steps.write().expect("lock poisoned");
        match map.get_mut(id) {
            Some(step)
                if &step.device == device
                    && !step.garbage
                    && step.progress.status == StepStatus::New =>
            {
                step.progress = progress.clone();
                step.time_modified = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn cancel(&self, id: &StepId, owner: &Prn, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut map = self.steps.write().expect("lock poisoned");
        match map.get_mut(id) {
            Some(step) if &step.owner == owner && step.progress.status == StepStatus::New => {
                step.progress.status = StepStatus::Cancel;
                step.time_modified = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn replace_state(
        &self,
        id: &StepId,
        owner: &Prn,
        state: &Value,
        state_sha: Sha256Id,
        used_objects: &[Sha256Id],
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut map = self.steps.write().expect("lock poisoned");
        match map.get_mut(id) {
            Some(step)
                if &step.owner == owner
                    && !step.garbage
                    && step.progress.status == StepStatus::New =>
            {
                step.state = state.clone();
                step.state_sha = state_sha;
                step.used_objects = used_objects.to_vec();
                step.time_modified = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn replace_meta(
        &self,
        id: &StepId,
        owner: &Prn,
        commit_msg: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut map = self.steps.write().expect("lock poisoned");
        match map.get_mut(id) {
            Some(step)
                if &step.owner == owner
                    && !step.garbage
                    && step.progress.status == StepStatus::New =>
            {
                step.commit_msg = commit_msg.to_string();
                step.time_modified = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_public(&self, id: &StepId, public: bool) -> StoreResult<bool> {
        let mut map = self.steps.write().expect("lock poisoned");
        match map.get_mut(id) {
            Some(step) => {
                step.is_public = public;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn used_shas_for_owner(&self, owner: &Prn) -> StoreResult<Vec<Sha256Id>> {
        let map = self.steps.read().expect("lock poisoned");
        let mut shas: Vec<Sha256Id> = map
            .values()
            .filter(|s| &s.owner == owner && !s.garbage)
            .flat_map(|s| s.used_objects.iter().copied())
            .collect();
        shas.sort();
        shas.dedup();
        Ok(shas)
    }

    fn public_step_uses(&self, owner: &Prn, sha: &Sha256Id) -> StoreResult<bool> {
        let map = self.steps.read().expect("lock poisoned");
        Ok(map.values().any(|s| {
            &s.owner == owner && !s.garbage && s.is_public && s.used_objects.contains(sha)
        }))
    }
}

impl std::fmt::Debug for InMemoryStepStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStepStore")
            .field("step_count", &self.len())
            .finish()
    }
}
