use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::handlers::{exports, objects, steps, trails};

/// Build the axum router over all trail endpoints.
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route(
            "/trails",
            post(trails::create_trail).get(trails::list_trails),
        )
        .route("/trails/:id", get(trails::get_trail))
        .route(
            "/trails/:id/steps",
            get(steps::list_steps).post(steps::append_step),
        )
        .route(
            "/trails/:id/steps/:rev",
            get(steps::get_step).put(steps::replace_step),
        )
        .route(
            "/trails/:id/steps/:rev/state",
            get(steps::get_state).put(steps::put_state),
        )
        .route(
            "/trails/:id/steps/:rev/meta",
            get(steps::get_meta).put(steps::put_meta),
        )
        .route("/trails/:id/steps/:rev/progress", put(steps::put_progress))
        .route("/trails/:id/steps/:rev/cancel", put(steps::put_cancel))
        .route(
            "/trails/:id/steps/:rev/objects",
            get(objects::list_objects).post(objects::post_object),
        )
        .route(
            "/trails/:id/steps/:rev/objects/:obj",
            get(objects::get_object),
        )
        .route(
            "/trails/:id/steps/:rev/objects/:obj/blob",
            get(objects::get_object_blob),
        )
        .route(
            "/exports/:owner/:nick/:rev/:filename",
            get(exports::get_export),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
