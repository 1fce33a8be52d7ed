//! Explicitly constructed application context.
//!
//! Every component the handlers need rides in one value cloned per
//! request; nothing lives in a process-wide registry.

use std::sync::Arc;

use axum::http::HeaderMap;

use trail_chain::{InMemoryStepStore, InMemoryTrailStore, StepChain};
use trail_export::ExportAssembler;
use trail_gate::{AccessGate, DeviceDirectory, PublicSourceGate};
use trail_objects::{
    FixedQuota, InMemoryBlobDriver, InMemoryObjectIndex, LinkSourceGate, ObjectStore,
};
use trail_types::Caller;

use crate::auth::{bearer_token, CallerResolver};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

#[derive(Clone)]
pub struct AppContext {
    pub chain: Arc<StepChain>,
    pub objects: Arc<ObjectStore>,
    pub gate: Arc<AccessGate>,
    pub exporter: Arc<ExportAssembler>,
    pub link_sources: Arc<dyn LinkSourceGate>,
    pub resolver: Arc<dyn CallerResolver>,
}

impl AppContext {
    pub fn new(
        chain: Arc<StepChain>,
        objects: Arc<ObjectStore>,
        gate: Arc<AccessGate>,
        exporter: Arc<ExportAssembler>,
        link_sources: Arc<dyn LinkSourceGate>,
        resolver: Arc<dyn CallerResolver>,
    ) -> Self {
        Self {
            chain,
            objects,
            gate,
            exporter,
            link_sources,
            resolver,
        }
    }

    /// Wire the whole service over in-memory backends. Production
    /// deployments construct the same components over their document and
    /// blob stores through the storage seams instead.
    pub fn in_memory(
        config: &ServerConfig,
        directory: Arc<dyn DeviceDirectory>,
        resolver: Arc<dyn CallerResolver>,
    ) -> Self {
        let objects = Arc::new(ObjectStore::new(
            Arc::new(InMemoryObjectIndex::new()),
            Arc::new(InMemoryBlobDriver::default()),
            Arc::new(FixedQuota::new(config.default_quota_bytes)),
        ));
        let steps = Arc::new(InMemoryStepStore::new());
        let chain = Arc::new(StepChain::new(
            Arc::new(InMemoryTrailStore::new()),
            steps.clone(),
            objects.clone(),
            config.auto_link,
        ));
        let gate = Arc::new(AccessGate::new(directory));
        let exporter = Arc::new(ExportAssembler::new(chain.clone(), objects.clone()));
        let link_sources = Arc::new(PublicSourceGate::new(steps));
        Self::new(chain, objects, gate, exporter, link_sources, resolver)
    }

    /// Resolve request credentials; anonymous requests pass as `None`.
    pub async fn maybe_caller(&self, headers: &HeaderMap) -> ServerResult<Option<Caller>> {
        self.resolver.resolve(bearer_token(headers)).await
    }

    /// Resolve request credentials, rejecting anonymous requests.
    pub async fn require_caller(&self, headers: &HeaderMap) -> ServerResult<Caller> {
        self.maybe_caller(headers)
            .await?
            .ok_or(ServerError::Unauthorized)
    }
}
