use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::info;

use trail_objects::{BlobDriver as _, ObjectIndex as _, ObjectRecord};
use trail_types::Sha256Id;

use crate::body::{ObjectRequest, ObjectResponse};
use crate::context::AppContext;
use crate::error::{ServerError, ServerResult};
use crate::handlers::{ensure_can_read_step, resolve_step, write_denied};

/// `POST /trails/{id}/steps/{rev}/objects` — register (or retry) an object
/// the step's state references. A registration whose bytes already exist
/// answers with the stored metadata and `conflict: true` instead of an
/// error; fresh registrations carry a signed upload location.
pub async fn post_object(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
    Json(req): Json<ObjectRequest>,
) -> ServerResult<Json<ObjectResponse>> {
    let caller = ctx.require_caller(&headers).await?;
    let step = resolve_step(&ctx, &id, &rev)?;
    if !ctx.gate.can_post_objects(&caller, &step) {
        return Err(write_denied(ctx.gate.can_read_step(&caller, &step)?));
    }
    if !step.used_objects.contains(&req.sha) {
        return Err(ServerError::BadRequest(format!(
            "object {} is not referenced by the step state",
            req.sha
        )));
    }

    let outcome = ctx
        .objects
        .put(&step.owner, req.sha, req.size, &req.object_name)?;
    let record = outcome.record();
    let mut response = ObjectResponse::from_record(record);
    if outcome.is_conflict() {
        response.conflict = true;
        response.signed_get_url = Some(
            ctx.objects
                .blobs()
                .signed_get_url(&record.backing_storage_id())?,
        );
    } else {
        response.signed_put_url = Some(ctx.objects.blobs().signed_put_url(&record.storage_id)?);
        info!(step = %step.id, sha = %req.sha.short_hex(), "object registered for upload");
    }
    Ok(Json(response))
}

/// `GET /trails/{id}/steps/{rev}/objects` — metadata of the step's
/// registered objects, sorted by name. References whose upload never
/// arrived are omitted.
pub async fn list_objects(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev)): Path<(String, String)>,
) -> ServerResult<Json<Vec<ObjectResponse>>> {
    let step = resolve_step(&ctx, &id, &rev)?;
    let caller = ctx.maybe_caller(&headers).await?;
    ensure_can_read_step(&ctx, caller.as_ref(), &step)?;

    let mut responses = Vec::with_capacity(step.used_objects.len());
    for sha in &step.used_objects {
        if let Some(record) = ctx.objects.index().get(&step.owner, sha)? {
            responses.push(ObjectResponse::from_record(&record));
        }
    }
    responses.sort_by(|a, b| a.object_name.cmp(&b.object_name));
    Ok(Json(responses))
}

/// `GET /trails/{id}/steps/{rev}/objects/{obj}` — one object's metadata,
/// with a signed download location when its bytes exist.
pub async fn get_object(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev, obj)): Path<(String, String, String)>,
) -> ServerResult<Json<ObjectResponse>> {
    let record = lookup_object(&ctx, &headers, &id, &rev, &obj).await?;
    let mut response = ObjectResponse::from_record(&record);
    if ctx.objects.blobs().exists(&record.backing_storage_id())? {
        response.signed_get_url = Some(
            ctx.objects
                .blobs()
                .signed_get_url(&record.backing_storage_id())?,
        );
    }
    Ok(Json(response))
}

/// `GET /trails/{id}/steps/{rev}/objects/{obj}/blob` — redirect to the
/// signed payload location; the bytes themselves never pass through here.
pub async fn get_object_blob(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((id, rev, obj)): Path<(String, String, String)>,
) -> ServerResult<Response> {
    let record = lookup_object(&ctx, &headers, &id, &rev, &obj).await?;
    if !ctx.objects.blobs().exists(&record.backing_storage_id())? {
        return Err(ServerError::NotFound);
    }
    let url = ctx
        .objects
        .blobs()
        .signed_get_url(&record.backing_storage_id())?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

async fn lookup_object(
    ctx: &AppContext,
    headers: &HeaderMap,
    id: &str,
    rev: &str,
    obj: &str,
) -> ServerResult<ObjectRecord> {
    let step = resolve_step(ctx, id, rev)?;
    let caller = ctx.maybe_caller(headers).await?;
    ensure_can_read_step(ctx, caller.as_ref(), &step)?;

    let sha = Sha256Id::from_hex(obj).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    if !step.used_objects.contains(&sha) {
        return Err(ServerError::NotFound);
    }
    ctx.objects
        .index()
        .get(&step.owner, &sha)?
        .ok_or(ServerError::NotFound)
}
