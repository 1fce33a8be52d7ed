use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

use trail_export::{write_tar, write_tar_gz};
use trail_gate::DeviceDirectory as _;
use trail_types::{Prn, TrailId};

use crate::context::AppContext;
use crate::error::{ServerError, ServerResult};
use crate::handlers::{ensure_can_read_trail, parse_selector};

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// Optional `/`-joined field path restricting the export to one state
    /// subtree.
    pub part: Option<String>,
}

/// `GET /exports/{owner}/{nick}/{rev}/{filename}` — a tar or tar.gz
/// archive of one revision's canonical state plus its objects. The
/// filename extension selects the format.
pub async fn get_export(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path((owner, nick, rev, filename)): Path<(String, String, String, String)>,
    Query(query): Query<ExportQuery>,
) -> ServerResult<Response> {
    let owner_prn = Prn::account(&owner);
    let device = ctx
        .gate
        .directory()
        .resolve_nick(&owner_prn, &nick)?
        .ok_or(ServerError::NotFound)?;
    let trail_id = TrailId::from_device(&device);
    let trail = ctx.chain.get_trail(&trail_id)?;
    let caller = ctx.maybe_caller(&headers).await?;
    ensure_can_read_trail(&ctx, caller.as_ref(), &trail)?;

    let selector = parse_selector(&rev)?;
    let export = ctx
        .exporter
        .assemble(&trail_id, selector, query.part.as_deref())?;

    let blobs = ctx.objects.blobs();
    let (bytes, content_type) = if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        (
            write_tar_gz(&export, blobs.as_ref(), Vec::new())?,
            "application/gzip",
        )
    } else if filename.ends_with(".tar") {
        (
            write_tar(&export, blobs.as_ref(), Vec::new())?,
            "application/x-tar",
        )
    } else {
        return Err(ServerError::BadRequest(
            "export filename must end in .tar, .tar.gz, or .tgz".to_string(),
        ));
    };

    info!(trail = %trail_id, rev = export.rev, size = bytes.len(), "export served");
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (
                header::LAST_MODIFIED,
                export.mod_time.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            ),
        ],
        bytes,
    )
        .into_response())
}
