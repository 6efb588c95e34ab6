//! Server orchestrator.
//!
//! `MockServer::start` validates the settings, loads static mappings, binds every
//! endpoint and spawns one accept loop per endpoint. The returned `ServerHandle`
//! is the only way to reach the running server; there is no process-wide
//! registry of servers.
//!
//! # Module Structure
//!
//! - `engine` - Shared mock state, matching, proxying and recording
//! - `handler` - Per-request hyper service, delays and faults
//! - `listener` - Endpoint binding, accept loop and graceful drain

mod engine;
mod handler;
mod listener;

pub use engine::{Engine, MappingAction, MatchOutcome, MockState, Served};
pub use handler::AbortConnection;

use crate::admin_api::{AdminApi, Credentials};
use crate::config::{Endpoint, RuntimeSettings, Scheme, ServerSettings};
use crate::error::{ConfigError, PersistenceError, ServerError};
use crate::mapping::{Mapping, MappingModel};
use crate::persistence::{FileSystemHandler, LocalFileSystemHandler};
use crate::proxy::tls::create_tls_acceptor;
use crate::request_log::LogEntry;
use crate::scenario::ScenarioState;
use handler::ServiceContext;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Entry point for starting mock servers.
pub struct MockServer;

impl MockServer {
    /// Start a server that reads and writes mapping files on the local disk.
    pub async fn start(settings: ServerSettings) -> Result<ServerHandle, ServerError> {
        Self::start_with_files(settings, Arc::new(LocalFileSystemHandler)).await
    }

    /// Start a server with a custom file-system handler.
    pub async fn start_with_files(
        settings: ServerSettings,
        files: Arc<dyn FileSystemHandler>,
    ) -> Result<ServerHandle, ServerError> {
        settings.validate()?;

        let cancel = CancellationToken::new();
        let engine = Arc::new(Engine::new(&settings, files, cancel.clone())?);
        if settings.read_static_mappings {
            engine.load_static_mappings()?;
        }

        let admin = settings.start_admin_interface.then(|| {
            let credentials = match (&settings.admin_username, &settings.admin_password) {
                (Some(username), Some(password)) => Some(Credentials::new(username, password)),
                _ => None,
            };
            Arc::new(AdminApi::new(Arc::clone(&engine), credentials))
        });
        let ctx = Arc::new(ServiceContext {
            engine: Arc::clone(&engine),
            admin,
        });

        let endpoints = settings.endpoints()?;
        let tls = if endpoints.iter().any(|e| e.scheme == Scheme::Https) {
            let tls = settings.tls.as_ref().ok_or_else(|| {
                ConfigError::InvalidSettings(
                    "TLS settings are required for https endpoints".to_string(),
                )
            })?;
            Some(create_tls_acceptor(&tls.cert_path, &tls.key_path)?)
        } else {
            None
        };

        // Bind everything before serving so a failed bind releases the others
        let mut bound = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            let acceptor = match endpoint.scheme {
                Scheme::Https => tls.clone(),
                Scheme::Http => None,
            };
            bound.push(
                listener::bind(endpoint, settings.dynamic_port_fallback, acceptor).await?,
            );
        }

        let endpoints: Vec<Endpoint> = bound.iter().map(|b| b.endpoint.clone()).collect();
        let drain_timeout = Duration::from_millis(settings.shutdown_timeout_ms);
        let tasks = bound
            .into_iter()
            .map(|b| {
                tokio::spawn(listener::accept_loop(
                    b,
                    Arc::clone(&ctx),
                    cancel.clone(),
                    drain_timeout,
                ))
            })
            .collect();

        info!(
            "Mock server started on {}",
            endpoints
                .iter()
                .map(Endpoint::url)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(ServerHandle {
            engine,
            endpoints,
            cancel,
            tasks,
        })
    }
}

/// Handle to a running server. Dropping it stops accepting connections;
/// `stop` also waits for the graceful drain.
pub struct ServerHandle {
    engine: Arc<Engine>,
    endpoints: Vec<Endpoint>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Base url of the first endpoint.
    pub fn url(&self) -> String {
        self.endpoints.first().map(Endpoint::url).unwrap_or_default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.endpoints.iter().map(Endpoint::url).collect()
    }

    pub fn ports(&self) -> Vec<u16> {
        self.endpoints.iter().map(|e| e.port).collect()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Register (or replace by guid) a mapping.
    pub fn register(&self, mapping: MappingModel) -> Result<Arc<Mapping>, ConfigError> {
        self.engine.register(mapping)
    }

    /// Register several mappings atomically.
    pub fn register_all(
        &self,
        mappings: Vec<MappingModel>,
    ) -> Result<Vec<Arc<Mapping>>, ServerError> {
        self.engine.register_all(mappings, false)
    }

    pub fn remove(&self, guid: Uuid) -> Option<Arc<Mapping>> {
        self.engine.remove(guid)
    }

    pub fn mapping(&self, guid: Uuid) -> Option<Arc<Mapping>> {
        self.engine.mapping(guid)
    }

    pub fn mappings(&self) -> Vec<Arc<Mapping>> {
        self.engine.mappings()
    }

    pub fn reset_mappings(&self) {
        self.engine.reset_mappings()
    }

    pub fn scenarios(&self) -> Vec<ScenarioState> {
        self.engine.scenarios()
    }

    pub fn reset_scenarios(&self) {
        self.engine.reset_scenarios()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.engine.log_entries()
    }

    pub fn reset_log(&self) {
        self.engine.reset_log()
    }

    pub fn settings(&self) -> RuntimeSettings {
        self.engine.settings()
    }

    pub fn set_settings(&self, settings: RuntimeSettings) -> Result<(), ConfigError> {
        self.engine.set_settings(settings)
    }

    /// Apply a partial JSON update to the runtime settings.
    pub fn update_settings(&self, patch: Value) -> Result<RuntimeSettings, ConfigError> {
        self.engine.update_settings(patch)
    }

    /// Remove mappings and scenarios and clear the request log.
    pub fn reset(&self) {
        self.engine.reset()
    }

    /// Write every mapping to the mappings directory.
    pub fn save_static_mappings(&self) -> Result<usize, PersistenceError> {
        self.engine.save_mappings()
    }

    /// Stop accepting connections, cancel pending delays and proxy calls, and
    /// wait for in-flight requests up to the shutdown timeout.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("Listener task ended abnormally: {}", e);
            }
        }
        info!("Mock server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
