//! HTTP surface of the Device Trail Service.
//!
//! Devices enroll by reporting their configuration state, owners append
//! revisions ("steps") to each device's trail, devices report progress
//! back, and binary payloads ride a content-addressed object store with
//! signed-URL transfer. Everything the handlers need is carried in an
//! explicitly constructed [`AppContext`]; caller identity arrives through
//! the [`CallerResolver`] seam as a typed value.
//!
//! [`CallerResolver`]: auth::CallerResolver

pub mod auth;
pub mod body;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use auth::{bearer_token, CallerResolver, StaticTokenResolver, TokenEntry};
pub use body::{AppendStepRequest, ObjectRequest, ObjectResponse, ReplaceStepRequest, StepMeta};
pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{ErrorResponse, ServerError, ServerResult};
pub use router::build_router;
pub use server::TrailServer;
