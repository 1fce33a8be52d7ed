//! Request handlers for the trail, step, object, and export endpoints.

pub mod exports;
pub mod objects;
pub mod steps;
pub mod trails;

use trail_chain::{Step, Trail};
use trail_types::{Caller, RevSelector, TrailId};

use crate::context::AppContext;
use crate::error::{ServerError, ServerResult};

/// Read gate for a trail. Anonymous callers pass only on public
/// visibility; denial is reported as not-found so existence never leaks.
pub(crate) fn ensure_can_read_trail(
    ctx: &AppContext,
    caller: Option<&Caller>,
    trail: &Trail,
) -> ServerResult<()> {
    let allowed = match caller {
        Some(caller) => ctx.gate.can_read_trail(caller, trail)?,
        None => ctx.gate.visibility(trail)?,
    };
    if allowed {
        Ok(())
    } else {
        Err(ServerError::NotFound)
    }
}

/// Read gate for a step, using the cached visibility flag.
pub(crate) fn ensure_can_read_step(
    ctx: &AppContext,
    caller: Option<&Caller>,
    step: &Step,
) -> ServerResult<()> {
    let allowed = match caller {
        Some(caller) => ctx.gate.can_read_step(caller, step)?,
        None => step.is_public,
    };
    if allowed {
        Ok(())
    } else {
        Err(ServerError::NotFound)
    }
}

/// Denial shape for a failed write: callers that may read the resource
/// learn the operation is not theirs; everyone else sees not-found.
pub(crate) fn write_denied(can_read: bool) -> ServerError {
    if can_read {
        ServerError::Forbidden
    } else {
        ServerError::NotFound
    }
}

pub(crate) fn parse_trail_id(s: &str) -> ServerResult<TrailId> {
    TrailId::parse(s).map_err(|e| ServerError::BadRequest(e.to_string()))
}

pub(crate) fn parse_selector(s: &str) -> ServerResult<RevSelector> {
    s.parse::<RevSelector>()
        .map_err(|e| ServerError::BadRequest(e.to_string()))
}

/// Resolve `{id}/steps/{rev}` path segments to the addressed step.
pub(crate) fn resolve_step(ctx: &AppContext, id: &str, rev: &str) -> ServerResult<Step> {
    let trail_id = parse_trail_id(id)?;
    let selector = parse_selector(rev)?;
    Ok(ctx.chain.step_at(&trail_id, selector)?)
}
