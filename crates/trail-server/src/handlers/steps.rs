use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;

use trail_chain::{Step, StepProgress, StepStatus};

use crate::body::{AppendStepRequest, ReplaceStepRequest, StepMeta};
use crate::context::AppContext;
use crate::error::{ServerError, ServerResult};
use crate::handlers::{
    ensure_can_read_step, ensure_can_read_trail, parse_trail_id, resolve_step, write_denied,
};

/// `GET /trails/{id}/steps` — the steps the caller still has to act on:
/// pending (`NEW`) steps for the owner and the device, the full history
/// for public readers.
pub async fn list_steps(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<Vec<Step>>> {
    let trail_id = parse_trail_id(&id)?;
    let trail = ctx.chain.get_trail(&trail_id)?;
    let caller = ctx.maybe_caller(&headers).await?;
    ensure_can_read_trail(&ctx, caller.as_ref(), &trail)?;

    let involved = caller.as_ref().is_some_and(|c| {
        c.acts_for(&trail.owner) || c.device_id().is_some_and(|d| d == trail.device)
    });
    let status = involved.then_some(StepStatus::New);
    Ok(Json(ctx.chain.list_steps(&trail_id, status)?))
}

/// `POST /trails/{id}/steps` — the owner appends a revision.
pub async fn append_step(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<AppendStepRequest>,
) -> ServerResult<Json<Step>> {
    let trail_id = parse_trail_id(&id)?;
    let caller = ctx.require_caller(&headers).await?;
    let trail = ctx.chain.get_trail(&trail_id)?;
    if !ctx.gate.can_append_step(&caller, &trail) {
        return Err(write_denied(ctx.gate.can_read_trail(&caller, &trail)?));
    }

    let is_public = ctx.gate.visibility(&trail)?;
    let step = ctx.chain.append_step(
        &trail_id,
        req.rev_spec(),
        req.state,
        &req.commit_msg,
        is_public,
        ctx.link_sources.as_ref(),
    )?;
    Ok(Json(step))
}

/// `GET /trails/{id}/steps/{rev}` — one step; `rev` is numeric or `latest`.
pub async fn get_step(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
) -> ServerResult<Json<Step>> {
    let step = resolve_step(&ctx, &id, &rev)?;
    let caller = ctx.maybe_caller(&headers).await?;
    ensure_can_read_step(&ctx, caller.as_ref(), &step)?;
    Ok(Json(step))
}

/// `PUT /trails/{id}/steps/{rev}` — the owner replaces state and meta of a
/// step the device has not consumed yet.
pub async fn replace_step(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
    Json(req): Json<ReplaceStepRequest>,
) -> ServerResult<Json<Step>> {
    let caller = ctx.require_caller(&headers).await?;
    let step = resolve_step(&ctx, &id, &rev)?;
    if !ctx.gate.can_edit_step(&caller, &step) {
        return Err(write_denied(ctx.gate.can_read_step(&caller, &step)?));
    }

    let trail = ctx.chain.get_trail(&step.trail)?;
    let is_public = ctx.gate.visibility(&trail)?;
    let mut updated = ctx.chain.replace_state(
        &step.id,
        &caller.account,
        req.state,
        is_public,
        ctx.link_sources.as_ref(),
    )?;
    if let Some(commit_msg) = req.commit_msg {
        updated = ctx.chain.replace_meta(&step.id, &caller.account, &commit_msg)?;
    }
    Ok(Json(updated))
}

/// `GET /trails/{id}/steps/{rev}/state`
pub async fn get_state(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
) -> ServerResult<Json<Value>> {
    let step = resolve_step(&ctx, &id, &rev)?;
    let caller = ctx.maybe_caller(&headers).await?;
    ensure_can_read_step(&ctx, caller.as_ref(), &step)?;
    Ok(Json(step.state))
}

/// `PUT /trails/{id}/steps/{rev}/state` — owner-only, while still `NEW`.
pub async fn put_state(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
    Json(state): Json<Value>,
) -> ServerResult<Json<Value>> {
    let caller = ctx.require_caller(&headers).await?;
    let step = resolve_step(&ctx, &id, &rev)?;
    if !ctx.gate.can_edit_step(&caller, &step) {
        return Err(write_denied(ctx.gate.can_read_step(&caller, &step)?));
    }

    let trail = ctx.chain.get_trail(&step.trail)?;
    let is_public = ctx.gate.visibility(&trail)?;
    let updated = ctx.chain.replace_state(
        &step.id,
        &caller.account,
        state,
        is_public,
        ctx.link_sources.as_ref(),
    )?;
    Ok(Json(updated.state))
}

/// `GET /trails/{id}/steps/{rev}/meta`
pub async fn get_meta(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
) -> ServerResult<Json<StepMeta>> {
    let step = resolve_step(&ctx, &id, &rev)?;
    let caller = ctx.maybe_caller(&headers).await?;
    ensure_can_read_step(&ctx, caller.as_ref(), &step)?;
    Ok(Json(StepMeta {
        commit_msg: step.commit_msg,
    }))
}

/// `PUT /trails/{id}/steps/{rev}/meta` — owner-only, while still `NEW`.
pub async fn put_meta(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
    Json(meta): Json<StepMeta>,
) -> ServerResult<Json<StepMeta>> {
    let caller = ctx.require_caller(&headers).await?;
    let step = resolve_step(&ctx, &id, &rev)?;
    if !ctx.gate.can_edit_step(&caller, &step) {
        return Err(write_denied(ctx.gate.can_read_step(&caller, &step)?));
    }

    let updated = ctx
        .chain
        .replace_meta(&step.id, &caller.account, &meta.commit_msg)?;
    Ok(Json(StepMeta {
        commit_msg: updated.commit_msg,
    }))
}

/// `PUT /trails/{id}/steps/{rev}/progress` — the step's own device reports
/// progress. Anyone else observes not-found, matching the conditional
/// update underneath.
pub async fn put_progress(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
    Json(progress): Json<StepProgress>,
) -> ServerResult<Json<StepProgress>> {
    let caller = ctx.require_caller(&headers).await?;
    let step = resolve_step(&ctx, &id, &rev)?;
    if !ctx.gate.can_post_progress(&caller, &step) {
        return Err(ServerError::NotFound);
    }
    let device = caller.device_id().ok_or(ServerError::NotFound)?;

    ctx.chain.update_progress(&step.id, &device, progress)?;
    Ok(Json(ctx.chain.get_step(&step.id)?.progress))
}

/// `PUT /trails/{id}/steps/{rev}/cancel` — the owner cancels a step still
/// in `NEW`. A step the device already finished reports not-found.
pub async fn put_cancel(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
) -> ServerResult<Json<Step>> {
    let caller = ctx.require_caller(&headers).await?;
    let step = resolve_step(&ctx, &id, &rev)?;
    if !ctx.gate.can_cancel_step(&caller, &step) {
        return Err(write_denied(ctx.gate.can_read_step(&caller, &step)?));
    }

    ctx.chain.cancel_step(&step.id, &caller.account)?;
    Ok(Json(ctx.chain.get_step(&step.id)?))
}
