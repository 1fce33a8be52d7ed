//! Autolink source qualification.
//!
//! Another owner's object may back a link only when it is reachable from a
//! step that is itself publicly visible. The object store owns the link
//! mechanics; this gate answers the reachability question by consulting
//! the step store.

use std::sync::Arc;

use tracing::debug;

use trail_chain::StepStore;
use trail_objects::{LinkSourceGate, ObjectError, ObjectRecord, ObjectResult};

/// [`LinkSourceGate`] backed by the step store.
pub struct PublicSourceGate {
    steps: Arc<dyn StepStore>,
}

impl PublicSourceGate {
    pub fn new(steps: Arc<dyn StepStore>) -> Self {
        Self { steps }
    }
}

impl LinkSourceGate for PublicSourceGate {
    fn allows(&self, source: &ObjectRecord) -> ObjectResult<bool> {
        let allowed = self
            .steps
            .public_step_uses(&source.owner, &source.sha)
            .map_err(|e| ObjectError::Backend(e.to_string()))?;
        if !allowed {
            debug!(owner = %source.owner, sha = %source.sha.short_hex(), "link source not public");
        }
        Ok(allowed)
    }
}
