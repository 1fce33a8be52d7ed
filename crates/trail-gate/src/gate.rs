use std::sync::Arc;

use tracing::debug;

use trail_chain::{Step, Trail};
use trail_types::Caller;

use crate::directory::DeviceDirectory;
use crate::error::GateResult;

/// Resolves caller access to trails and steps.
///
/// Explicitly constructed with its device directory; consumers hold it in
/// their context object. All predicates are pure reads — denial reporting
/// is left to the HTTP layer so that identity-based denials never leak
/// whether the resource exists.
pub struct AccessGate {
    directory: Arc<dyn DeviceDirectory>,
}

impl AccessGate {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<dyn DeviceDirectory> {
        &self.directory
    }

    /// Effective visibility of a trail: public iff its owning device is
    /// currently flagged public. Recomputed here on every step write and
    /// cached on the step for fast reads.
    pub fn visibility(&self, trail: &Trail) -> GateResult<bool> {
        self.directory.is_public(&trail.device)
    }

    /// Read access to a trail: public visibility, the owning account, or
    /// the trail's own device.
    pub fn can_read_trail(&self, caller: &Caller, trail: &Trail) -> GateResult<bool> {
        if caller.acts_for(&trail.owner) {
            return Ok(true);
        }
        if self.is_trail_device(caller, trail) {
            return Ok(true);
        }
        let public = self.visibility(trail)?;
        if !public {
            debug!(trail = %trail.id, caller = %caller.identity, "read denied");
        }
        Ok(public)
    }

    /// Read access to a step: the cached visibility flag serves the public
    /// case without a directory lookup.
    pub fn can_read_step(&self, caller: &Caller, step: &Step) -> GateResult<bool> {
        Ok(step.is_public
            || caller.acts_for(&step.owner)
            || caller
                .device_id()
                .is_some_and(|device| device == step.device))
    }

    /// Only a device creates its own trail (first state report).
    pub fn can_create_trail(&self, caller: &Caller) -> bool {
        caller.is_device()
    }

    /// Only the owning account appends steps.
    pub fn can_append_step(&self, caller: &Caller, trail: &Trail) -> bool {
        caller.acts_for(&trail.owner)
    }

    /// Only the owning account rewrites a step's state or meta.
    pub fn can_edit_step(&self, caller: &Caller, step: &Step) -> bool {
        caller.acts_for(&step.owner)
    }

    /// Only the owning account cancels a step.
    pub fn can_cancel_step(&self, caller: &Caller, step: &Step) -> bool {
        caller.acts_for(&step.owner)
    }

    /// Only the step's own device posts progress.
    pub fn can_post_progress(&self, caller: &Caller, step: &Step) -> bool {
        caller
            .device_id()
            .is_some_and(|device| device == step.device)
    }

    /// Object upload/link follows step write access: the owner, or the
    /// device reporting its own factory objects.
    pub fn can_post_objects(&self, caller: &Caller, step: &Step) -> bool {
        caller.acts_for(&step.owner)
            || caller
                .device_id()
                .is_some_and(|device| device == step.device)
    }

    fn is_trail_device(&self, caller: &Caller, trail: &Trail) -> bool {
        caller
            .device_id()
            .is_some_and(|device| device == trail.device)
    }
}
