//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::Arc;

use portal_invoke::Invoke;
use portal_session::EvictionHandle;
use portal_types::PortalError;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::facade::SurfaceService;
use crate::surface::Surface;

/// Application state shared across all handlers.
///
/// Everything here is built at startup and injected; there are no
/// process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Session-backed facades by surface.
    pub surfaces: Arc<HashMap<Surface, Arc<dyn SurfaceService>>>,

    /// Remote invocation over the connection pool.
    pub invoker: Arc<dyn Invoke>,
}

impl AppState {
    /// Create a new application state with no surfaces enabled.
    pub fn new(config: ServerConfig, invoker: Arc<dyn Invoke>) -> Self {
        Self {
            config: Arc::new(config),
            surfaces: Arc::new(HashMap::new()),
            invoker,
        }
    }

    /// Register the facade for its surface, replacing any previous one.
    pub fn with_surface(mut self, service: impl SurfaceService + 'static) -> Self {
        let mut surfaces = (*self.surfaces).clone();
        surfaces.insert(service.surface(), Arc::new(service));
        self.surfaces = Arc::new(surfaces);
        self
    }

    /// The facade serving `surface`.
    pub fn surface(&self, surface: Surface) -> Result<Arc<dyn SurfaceService>, PortalError> {
        self.surfaces
            .get(&surface)
            .cloned()
            .ok_or_else(|| PortalError::InvalidParameter(format!("surface '{surface}' is not enabled")))
    }

    /// Start one eviction loop per surface.
    pub fn start_eviction(&self) -> Vec<EvictionHandle> {
        let handles: Vec<_> = self
            .surfaces
            .values()
            .map(|service| service.start_eviction())
            .collect();
        info!(surfaces = handles.len(), "Session eviction started");
        handles
    }

    /// Close the invocation pool, then every cached session. Best effort.
    pub async fn shutdown(&self) {
        self.invoker.shutdown().await;
        for service in self.surfaces.values() {
            service.shutdown().await;
            debug!(surface = %service.surface(), "Surface sessions closed");
        }
    }
}
