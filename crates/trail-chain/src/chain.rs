//! The step chain service: chain validation, state processing, and the
//! progress state machine, on top of the storage traits.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use trail_codec::{canonical_bytes, escape_keys, extract_object_refs, state_sha, unescape_keys};
use trail_objects::{LinkSourceGate, ObjectError, ObjectStore};
use trail_types::{DeviceId, Prn, Rev, RevSelector, RevSpec, Sha256Id, StepId, TrailId};

use crate::error::{ChainError, ChainResult};
use crate::step::{Step, StepProgress, StepStatus};
use crate::traits::{StepStore, TrailStore};
use crate::trail::Trail;

/// Owns trails and steps: enforces revision ordering, computes state
/// hashes, extracts and resolves object references, and drives the
/// progress state machine.
///
/// The chain performs no access checks; callers gate every operation
/// first and pass in the already-computed visibility flag so it can be
/// cached on the written step.
pub struct StepChain {
    trails: Arc<dyn TrailStore>,
    steps: Arc<dyn StepStore>,
    objects: Arc<ObjectStore>,
    auto_link: bool,
}

impl StepChain {
    pub fn new(
        trails: Arc<dyn TrailStore>,
        steps: Arc<dyn StepStore>,
        objects: Arc<ObjectStore>,
        auto_link: bool,
    ) -> Self {
        Self {
            trails,
            steps,
            objects,
            auto_link,
        }
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Build a trail plus its rev-0 step in one unit, both immediately
    /// `Done` — the factory baseline a device reports at enrollment.
    pub fn create_trail(
        &self,
        device: DeviceId,
        owner: Prn,
        initial_state: Value,
        is_public: bool,
        source_gate: &dyn LinkSourceGate,
    ) -> ChainResult<(Trail, Step)> {
        let now = Utc::now();
        let sha = state_sha(&initial_state)?;
        let used = self.process_state(&owner, &initial_state, source_gate)?;
        let stored_state = escape_keys(&initial_state);

        let trail = Trail::new(device.clone(), owner.clone(), stored_state.clone(), used.clone(), now);
        if !self.trails.insert_new(&trail)? {
            return Err(ChainError::TrailExists(trail.id));
        }

        let step = Step::new(
            trail.id.clone(),
            owner,
            device,
            0,
            "factory state",
            stored_state,
            sha,
            used,
            StepProgress::baseline(),
            is_public,
            now,
        );
        if !self.steps.insert_new(&step)? {
            // The trail insert above succeeded, so a rev-0 step can only
            // pre-exist if a previous create raced us past the trail check.
            return Err(ChainError::RevConflict {
                trail: step.trail,
                rev: 0,
            });
        }

        info!(trail = %step.trail, sha = %sha.short_hex(), "trail created");
        Ok((self.public_trail(trail)?, self.public_step(step)?))
    }

    /// Append a step at `rev` (or the next free revision for
    /// [`RevSpec::Auto`]).
    ///
    /// The predecessor step must exist and not be garbage, else the chain
    /// would have a gap and the append fails with [`ChainError::ChainBroken`].
    /// Two concurrent auto appends may compute the same revision; the
    /// storage unique id breaks the tie and the loser gets
    /// [`ChainError::RevConflict`].
    pub fn append_step(
        &self,
        trail_id: &TrailId,
        rev: RevSpec,
        state: Value,
        commit_msg: &str,
        is_public: bool,
        source_gate: &dyn LinkSourceGate,
    ) -> ChainResult<Step> {
        let trail = self.require_trail(trail_id)?;

        let rev = match rev {
            RevSpec::At(rev) => rev,
            // Best-effort read-then-write; the insert below is the actual
            // tie-breaker.
            RevSpec::Auto => self
                .steps
                .max_rev(trail_id)?
                .map(|max| max + 1)
                .unwrap_or(0),
        };

        if rev == 0 {
            // Rev 0 is created with the trail and can never be appended.
            return Err(ChainError::RevConflict {
                trail: trail_id.clone(),
                rev: 0,
            });
        }
        let predecessor = StepId::new(trail_id.clone(), rev - 1);
        match self.steps.get(&predecessor)? {
            Some(step) if !step.garbage => {}
            _ => {
                warn!(trail = %trail_id, rev, "append rejected: predecessor missing");
                return Err(ChainError::ChainBroken {
                    trail: trail_id.clone(),
                    rev,
                });
            }
        }

        let now = Utc::now();
        let sha = state_sha(&state)?;
        let used = self.process_state(&trail.owner, &state, source_gate)?;
        let step = Step::new(
            trail_id.clone(),
            trail.owner.clone(),
            trail.device.clone(),
            rev,
            commit_msg,
            escape_keys(&state),
            sha,
            used,
            StepProgress::pending(),
            is_public,
            now,
        );
        if !self.steps.insert_new(&step)? {
            return Err(ChainError::RevConflict {
                trail: trail_id.clone(),
                rev,
            });
        }
        self.trails.touch(trail_id, now)?;

        info!(step = %step.id, sha = %sha.short_hex(), "step appended");
        self.public_step(step)
    }

    /// Device-side progress report. Matches only the step's own device
    /// while the step is still `New`; zero matched documents is
    /// [`ChainError::StepNotFound`], covering unknown step and
    /// not-your-step alike.
    pub fn update_progress(
        &self,
        id: &StepId,
        device: &DeviceId,
        progress: StepProgress,
    ) -> ChainResult<()> {
        let now = Utc::now();
        if !self.steps.update_progress(id, device, &progress, now)? {
            return Err(ChainError::StepNotFound(id.clone()));
        }
        self.trails.touch(id.trail(), now)?;
        if progress.status == StepStatus::Done {
            self.trails.set_in_sync(id.trail(), now)?;
        }
        debug!(step = %id, status = %progress.status, "progress updated");
        Ok(())
    }

    /// Owner-side cancel of a step the device has not consumed yet. The
    /// conditional match on status `New` is the sole concurrency-safety
    /// mechanism against a simultaneous device progress report.
    pub fn cancel_step(&self, id: &StepId, owner: &Prn) -> ChainResult<()> {
        let now = Utc::now();
        if !self.steps.cancel(id, owner, now)? {
            return Err(ChainError::StepNotFound(id.clone()));
        }
        self.trails.touch(id.trail(), now)?;
        info!(step = %id, "step cancelled");
        Ok(())
    }

    /// Owner-side state replacement of a step still in `New`.
    pub fn replace_state(
        &self,
        id: &StepId,
        owner: &Prn,
        state: Value,
        is_public: bool,
        source_gate: &dyn LinkSourceGate,
    ) -> ChainResult<Step> {
        let now = Utc::now();
        let sha = state_sha(&state)?;
        let used = self.process_state(owner, &state, source_gate)?;
        let stored = escape_keys(&state);
        if !self
            .steps
            .replace_state(id, owner, &stored, sha, &used, now)?
        {
            return Err(ChainError::StepNotFound(id.clone()));
        }
        self.steps.set_public(id, is_public)?;
        self.trails.touch(id.trail(), now)?;
        self.require_step(id)
    }

    /// Owner-side commit-message replacement of a step still in `New`.
    pub fn replace_meta(&self, id: &StepId, owner: &Prn, commit_msg: &str) -> ChainResult<Step> {
        let now = Utc::now();
        if !self.steps.replace_meta(id, owner, commit_msg, now)? {
            return Err(ChainError::StepNotFound(id.clone()));
        }
        self.trails.touch(id.trail(), now)?;
        self.require_step(id)
    }

    /// Soft-delete a trail.
    pub fn mark_trail_garbage(&self, id: &TrailId) -> ChainResult<()> {
        if !self.trails.mark_garbage(id)? {
            return Err(ChainError::TrailNotFound(id.clone()));
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Fetch a live trail with its state restored to caller form.
    pub fn get_trail(&self, id: &TrailId) -> ChainResult<Trail> {
        let trail = self.require_trail(id)?;
        self.public_trail(trail)
    }

    /// All live trails owned by an account.
    pub fn trails_for_owner(&self, owner: &Prn) -> ChainResult<Vec<Trail>> {
        self.trails
            .list_by_owner(owner)?
            .into_iter()
            .map(|t| self.public_trail(t))
            .collect()
    }

    /// The one trail belonging to a device, if it enrolled already.
    pub fn trail_for_device(&self, device: &DeviceId) -> ChainResult<Option<Trail>> {
        match self.trails.get_by_device(device)? {
            Some(trail) => Ok(Some(self.public_trail(trail)?)),
            None => Ok(None),
        }
    }

    /// Fetch a live step with its state restored to caller form.
    pub fn get_step(&self, id: &StepId) -> ChainResult<Step> {
        self.require_step(id)
    }

    /// Steps of a trail in rev order, optionally filtered by status.
    pub fn list_steps(
        &self,
        trail: &TrailId,
        status: Option<StepStatus>,
    ) -> ChainResult<Vec<Step>> {
        self.require_trail(trail)?;
        self.steps
            .list(trail, status)?
            .into_iter()
            .map(|s| self.public_step(s))
            .collect()
    }

    /// Resolve a revision selector against a trail.
    pub fn step_at(&self, trail: &TrailId, selector: RevSelector) -> ChainResult<Step> {
        let rev: Rev = match selector {
            RevSelector::At(rev) => rev,
            RevSelector::Latest => self
                .steps
                .max_rev(trail)?
                .ok_or_else(|| ChainError::TrailNotFound(trail.clone()))?,
        };
        self.require_step(&StepId::new(trail.clone(), rev))
    }

    /// The canonical encoding of a step's state.
    pub fn canonical_state(&self, step: &Step) -> ChainResult<Vec<u8>> {
        Ok(canonical_bytes(&step.state)?)
    }

    /// Content hashes still referenced by the owner's live trails and
    /// steps. The external garbage-collection sweep reclaims every owned
    /// object whose sha is absent from this set.
    pub fn live_object_shas(&self, owner: &Prn) -> ChainResult<Vec<Sha256Id>> {
        let mut shas = self.steps.used_shas_for_owner(owner)?;
        for trail in self.trails.list_by_owner(owner)? {
            shas.extend(trail.used_objects.iter().copied());
        }
        shas.sort();
        shas.dedup();
        Ok(shas)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    /// Extract object references from a state tree and resolve each
    /// against the object store, autolinking from public sources where
    /// allowed. A sha with no record and no linkable source stays in the
    /// list — its upload arrives later through the objects endpoint.
    ///
    /// Runs before any step document is written so that a codec or store
    /// failure never leaves a partially committed step.
    fn process_state(
        &self,
        owner: &Prn,
        state: &Value,
        source_gate: &dyn LinkSourceGate,
    ) -> ChainResult<Vec<Sha256Id>> {
        let refs = extract_object_refs(state);
        let mut used = Vec::with_capacity(refs.len());
        for object_ref in refs {
            match self.objects.resolve_with_link(
                owner,
                &object_ref.sha,
                &object_ref.name,
                self.auto_link,
                source_gate,
            ) {
                Ok(_) => {}
                Err(ObjectError::NotAvailable { sha }) => {
                    debug!(
                        name = %object_ref.name,
                        sha = %sha.short_hex(),
                        "object awaits explicit upload"
                    );
                }
                Err(other) => return Err(other.into()),
            }
            used.push(object_ref.sha);
        }
        used.sort();
        used.dedup();
        Ok(used)
    }

    fn require_trail(&self, id: &TrailId) -> ChainResult<Trail> {
        match self.trails.get(id)? {
            Some(trail) if !trail.garbage => Ok(trail),
            _ => Err(ChainError::TrailNotFound(id.clone())),
        }
    }

    fn require_step(&self, id: &StepId) -> ChainResult<Step> {
        match self.steps.get(id)? {
            Some(step) if !step.garbage => self.public_step(step),
            _ => Err(ChainError::StepNotFound(id.clone())),
        }
    }

    fn public_trail(&self, mut trail: Trail) -> ChainResult<Trail> {
        trail.factory_state = unescape_keys(&trail.factory_state)?;
        Ok(trail)
    }

    fn public_step(&self, mut step: Step) -> ChainResult<Step> {
        step.state = unescape_keys(&step.state)?;
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use trail_objects::{
        FixedQuota, InMemoryBlobDriver, InMemoryObjectIndex, ObjectRecord, ObjectResult,
    };

    use crate::memory::{InMemoryStepStore, InMemoryTrailStore};

    struct AllowAll;

    impl LinkSourceGate for AllowAll {
        fn allows(&self, _source: &ObjectRecord) -> ObjectResult<bool> {
            Ok(true)
        }
    }

    fn device() -> DeviceId {
        DeviceId::parse("dev1").unwrap()
    }

    fn owner() -> Prn {
        Prn::account("user1")
    }

    fn chain() -> StepChain {
        let objects = ObjectStore::new(
            Arc::new(InMemoryObjectIndex::new()),
            Arc::new(InMemoryBlobDriver::default()),
            Arc::new(FixedQuota::new(u64::MAX)),
        );
        StepChain::new(
            Arc::new(InMemoryTrailStore::new()),
            Arc::new(InMemoryStepStore::new()),
            Arc::new(objects),
            true,
        )
    }

    fn enrolled(state: Value) -> (StepChain, TrailId) {
        let chain = chain();
        let (trail, _) = chain
            .create_trail(device(), owner(), state, false, &AllowAll)
            .unwrap();
        let id = trail.id.clone();
        (chain, id)
    }

    #[test]
    fn create_trail_builds_done_rev_zero() {
        let (chain, trail_id) = enrolled(json!({"a": 1}));
        let step = chain
            .step_at(&trail_id, RevSelector::At(0))
            .unwrap();
        assert_eq!(step.rev, 0);
        assert_eq!(step.progress.status, StepStatus::Done);
    }

    #[test]
    fn create_trail_twice_is_rejected() {
        let (chain, _) = enrolled(json!({}));
        let err = chain
            .create_trail(device(), owner(), json!({}), false, &AllowAll)
            .unwrap_err();
        assert!(matches!(err, ChainError::TrailExists(_)));
    }

    #[test]
    fn append_walks_the_chain() {
        let (chain, trail_id) = enrolled(json!({"a": 1}));

        let s1 = chain
            .append_step(&trail_id, RevSpec::At(1), json!({"a": 2}), "bump", false, &AllowAll)
            .unwrap();
        assert_eq!(s1.rev, 1);
        assert_eq!(s1.progress.status, StepStatus::New);

        let s2 = chain
            .append_step(&trail_id, RevSpec::Auto, json!({"a": 3}), "bump", false, &AllowAll)
            .unwrap();
        assert_eq!(s2.rev, 2);
    }

    #[test]
    fn append_with_gap_is_chain_broken() {
        let (chain, trail_id) = enrolled(json!({"a": 1}));
        let err = chain
            .append_step(&trail_id, RevSpec::At(3), json!({"a": 2}), "skip", false, &AllowAll)
            .unwrap_err();
        assert!(matches!(err, ChainError::ChainBroken { rev: 3, .. }));
    }

    #[test]
    fn append_at_existing_rev_is_conflict() {
        let (chain, trail_id) = enrolled(json!({}));
        chain
            .append_step(&trail_id, RevSpec::At(1), json!({}), "one", false, &AllowAll)
            .unwrap();
        let err = chain
            .append_step(&trail_id, RevSpec::At(1), json!({}), "again", false, &AllowAll)
            .unwrap_err();
        assert!(matches!(err, ChainError::RevConflict { rev: 1, .. }));
    }

    #[test]
    fn append_at_rev_zero_is_conflict() {
        let (chain, trail_id) = enrolled(json!({}));
        let err = chain
            .append_step(&trail_id, RevSpec::At(0), json!({}), "zero", false, &AllowAll)
            .unwrap_err();
        assert!(matches!(err, ChainError::RevConflict { rev: 0, .. }));
    }

    #[test]
    fn trail_and_step_state_hash_identically() {
        // The same state posted once via trail creation and once via step
        // creation must yield identical hashes.
        let state = json!({"mystate": "mystate"});
        let (chain, trail_id) = enrolled(state.clone());
        let s0 = chain.step_at(&trail_id, RevSelector::At(0)).unwrap();
        let s1 = chain
            .append_step(&trail_id, RevSpec::At(1), state, "same", false, &AllowAll)
            .unwrap();
        assert_eq!(s0.state_sha, s1.state_sha);
    }

    #[test]
    fn state_with_unsafe_keys_round_trips() {
        let state = json!({"app.config": {"$set": true}, "plain": 1});
        let (chain, trail_id) = enrolled(state.clone());
        let step = chain.step_at(&trail_id, RevSelector::At(0)).unwrap();
        assert_eq!(step.state, state);

        let trail = chain.get_trail(&trail_id).unwrap();
        assert_eq!(trail.factory_state, state);
    }

    #[test]
    fn object_refs_are_recorded_on_the_step() {
        let sha = Sha256Id::digest(b"kernel");
        let state = json!({"kernel.img": sha.to_hex(), "meta.json": {"v": 1}});
        let (chain, trail_id) = enrolled(state);
        let step = chain.step_at(&trail_id, RevSelector::At(0)).unwrap();
        assert_eq!(step.used_objects, vec![sha]);
    }

    #[test]
    fn progress_done_marks_trail_in_sync() {
        let (chain, trail_id) = enrolled(json!({}));
        let step = chain
            .append_step(&trail_id, RevSpec::Auto, json!({}), "go", false, &AllowAll)
            .unwrap();

        let mut done = StepProgress::pending();
        done.status = StepStatus::Done;
        done.progress = 100;
        chain.update_progress(&step.id, &device(), done).unwrap();

        let trail = chain.get_trail(&trail_id).unwrap();
        assert!(trail.last_in_sync.is_some());
        assert_eq!(
            chain.get_step(&step.id).unwrap().progress.status,
            StepStatus::Done
        );
    }

    #[test]
    fn progress_from_wrong_device_is_not_found() {
        let (chain, trail_id) = enrolled(json!({}));
        let step = chain
            .append_step(&trail_id, RevSpec::Auto, json!({}), "go", false, &AllowAll)
            .unwrap();

        let stranger = DeviceId::parse("dev2").unwrap();
        let err = chain
            .update_progress(&step.id, &stranger, StepProgress::pending())
            .unwrap_err();
        assert!(matches!(err, ChainError::StepNotFound(_)));
    }

    #[test]
    fn cancel_while_new_succeeds_once() {
        let (chain, trail_id) = enrolled(json!({}));
        let step = chain
            .append_step(&trail_id, RevSpec::Auto, json!({}), "go", false, &AllowAll)
            .unwrap();

        chain.cancel_step(&step.id, &owner()).unwrap();
        assert_eq!(
            chain.get_step(&step.id).unwrap().progress.status,
            StepStatus::Cancel
        );

        let err = chain.cancel_step(&step.id, &owner()).unwrap_err();
        assert!(matches!(err, ChainError::StepNotFound(_)));
    }

    #[test]
    fn cancel_after_device_finished_is_not_found() {
        let (chain, trail_id) = enrolled(json!({}));
        let step = chain
            .append_step(&trail_id, RevSpec::Auto, json!({}), "go", false, &AllowAll)
            .unwrap();

        let mut done = StepProgress::pending();
        done.status = StepStatus::Done;
        chain.update_progress(&step.id, &device(), done).unwrap();

        let err = chain.cancel_step(&step.id, &owner()).unwrap_err();
        assert!(matches!(err, ChainError::StepNotFound(_)));
    }

    #[test]
    fn replace_state_recomputes_hash_and_objects() {
        let (chain, trail_id) = enrolled(json!({}));
        let step = chain
            .append_step(&trail_id, RevSpec::Auto, json!({"a": 1}), "go", false, &AllowAll)
            .unwrap();

        let sha = Sha256Id::digest(b"fw");
        let new_state = json!({"fw.bin": sha.to_hex()});
        let updated = chain
            .replace_state(&step.id, &owner(), new_state.clone(), false, &AllowAll)
            .unwrap();
        assert_eq!(updated.state, new_state);
        assert_eq!(updated.used_objects, vec![sha]);
        assert_ne!(updated.state_sha, step.state_sha);
    }

    #[test]
    fn replace_state_after_cancel_is_not_found() {
        let (chain, trail_id) = enrolled(json!({}));
        let step = chain
            .append_step(&trail_id, RevSpec::Auto, json!({}), "go", false, &AllowAll)
            .unwrap();
        chain.cancel_step(&step.id, &owner()).unwrap();

        let err = chain
            .replace_state(&step.id, &owner(), json!({"x": 1}), false, &AllowAll)
            .unwrap_err();
        assert!(matches!(err, ChainError::StepNotFound(_)));
    }

    #[test]
    fn step_at_latest_resolves_max_rev() {
        let (chain, trail_id) = enrolled(json!({}));
        chain
            .append_step(&trail_id, RevSpec::Auto, json!({}), "one", false, &AllowAll)
            .unwrap();
        chain
            .append_step(&trail_id, RevSpec::Auto, json!({}), "two", false, &AllowAll)
            .unwrap();

        let latest = chain.step_at(&trail_id, RevSelector::Latest).unwrap();
        assert_eq!(latest.rev, 2);
    }

    #[test]
    fn live_object_shas_cover_trail_and_steps() {
        let sha0 = Sha256Id::digest(b"factory");
        let (chain, trail_id) = enrolled(json!({"f.bin": sha0.to_hex()}));

        let sha1 = Sha256Id::digest(b"update");
        chain
            .append_step(
                &trail_id,
                RevSpec::Auto,
                json!({"u.bin": sha1.to_hex()}),
                "up",
                false,
                &AllowAll,
            )
            .unwrap();

        let live = chain.live_object_shas(&owner()).unwrap();
        assert!(live.contains(&sha0));
        assert!(live.contains(&sha1));
    }

    #[test]
    fn end_to_end_scenario() {
        // create trail {"a":1} → rev 0 DONE; append {"a":2} → rev 1;
        // append rev 3 directly → ChainBroken; cancel rev 1 while NEW.
        let (chain, trail_id) = enrolled(json!({"a": 1}));
        assert_eq!(
            chain
                .step_at(&trail_id, RevSelector::At(0))
                .unwrap()
                .progress
                .status,
            StepStatus::Done
        );

        let s1 = chain
            .append_step(&trail_id, RevSpec::At(1), json!({"a": 2}), "a=2", false, &AllowAll)
            .unwrap();

        let err = chain
            .append_step(&trail_id, RevSpec::At(3), json!({"a": 4}), "skip", false, &AllowAll)
            .unwrap_err();
        assert!(matches!(err, ChainError::ChainBroken { rev: 3, .. }));

        chain.cancel_step(&s1.id, &owner()).unwrap();
        assert_eq!(
            chain.get_step(&s1.id).unwrap().progress.status,
            StepStatus::Cancel
        );
    }
}
