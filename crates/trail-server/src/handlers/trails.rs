use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;
use tracing::info;

use trail_chain::Trail;
use trail_gate::DeviceDirectory as _;

use crate::context::AppContext;
use crate::error::{ServerError, ServerResult};
use crate::handlers::{ensure_can_read_trail, parse_trail_id};

/// `POST /trails` — a device reports its initial state and receives its
/// trail with the rev-0 factory step already marked done.
pub async fn create_trail(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(state): Json<Value>,
) -> ServerResult<Json<Trail>> {
    let caller = ctx.require_caller(&headers).await?;
    if !ctx.gate.can_create_trail(&caller) {
        return Err(ServerError::Forbidden);
    }
    let device = caller.device_id().ok_or(ServerError::Forbidden)?;
    let is_public = ctx.gate.directory().is_public(&device)?;

    let (trail, _) = ctx.chain.create_trail(
        device,
        caller.account.clone(),
        state,
        is_public,
        ctx.link_sources.as_ref(),
    )?;
    info!(trail = %trail.id, owner = %trail.owner, "trail enrolled");
    Ok(Json(trail))
}

/// `GET /trails` — the caller's visible trails: its one trail for a
/// device, every owned trail for a user or session.
pub async fn list_trails(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> ServerResult<Json<Vec<Trail>>> {
    let caller = ctx.require_caller(&headers).await?;
    let trails = match caller.device_id() {
        Some(device) => ctx.chain.trail_for_device(&device)?.into_iter().collect(),
        None => ctx.chain.trails_for_owner(&caller.account)?,
    };
    Ok(Json(trails))
}

/// `GET /trails/{id}` — one trail, visibility-gated.
pub async fn get_trail(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<Trail>> {
    let trail_id = parse_trail_id(&id)?;
    let trail = ctx.chain.get_trail(&trail_id)?;
    let caller = ctx.maybe_caller(&headers).await?;
    ensure_can_read_trail(&ctx, caller.as_ref(), &trail)?;
    Ok(Json(trail))
}
