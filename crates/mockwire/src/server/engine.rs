//! Shared mock state and request resolution.
//!
//! The registry and scenario table live behind one reader-writer lock. While no
//! mapping is bound to a scenario, matching takes the read lock. Once any
//! scenario exists, match, render and state transition run as a single
//! critical section under the write lock, so a transition made for one request
//! is visible to every request accepted after it.
//!
//! Body files are read on a blocking task before the lock is taken. Upstream
//! calls and recording happen after the lock is released.

use crate::config::{ProxyAndRecordSettings, RuntimeSettings, ServerSettings};
use crate::error::{ConfigError, PersistenceError, ProxyError, ServerError};
use crate::mapping::{
    Candidate, Mapping, MappingModel, MappingRegistry, MatchOptions, MatchReport, RequestMatcher,
};
use crate::persistence::{mapping_file_path, FileSystemHandler};
use crate::proxy::{synthesize_mapping, ProxyClient, StatusCodePattern, UpstreamResponse};
use crate::request::RequestMessage;
use crate::request_log::{LogEntry, LoggedRequest, RequestLog};
use crate::response::{body_file_path, render, RenderError, RenderedResponse};
use crate::scenario::{ScenarioState, ScenarioTable};
use bytes::Bytes;
use hyper::StatusCode;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MockState {
    pub registry: MappingRegistry,
    pub scenarios: ScenarioTable,
}

/// What a selected mapping does with the request.
#[derive(Debug)]
pub enum MappingAction {
    Respond(RenderedResponse),
    /// Forward to this upstream base url
    Forward(String),
    /// Rendering failed; scenario state was not advanced
    Failed(RenderError),
}

/// Result of matching a request against the registry.
#[derive(Debug)]
pub enum MatchOutcome {
    Matched {
        candidate: Candidate,
        action: MappingAction,
    },
    /// No mapping matched and a global proxy is configured
    FallThroughProxy(ProxyAndRecordSettings),
    /// No mapping matched and there is nowhere to forward to
    NotFound { closest: Option<Candidate> },
}

/// A response decided by the engine, before delay and faults are applied.
#[derive(Debug)]
pub struct Served {
    pub response: RenderedResponse,
    pub mapping: Option<Candidate>,
    /// The response came from an upstream
    pub proxied: bool,
}

pub struct Engine {
    state: RwLock<MockState>,
    log: Mutex<RequestLog>,
    settings: RwLock<RuntimeSettings>,
    rng: Mutex<StdRng>,
    files: Arc<dyn FileSystemHandler>,
    proxy: ProxyClient,
    cancel: CancellationToken,
    files_dir: PathBuf,
    mappings_dir: PathBuf,
    parse_json: bool,
}

impl Engine {
    pub fn new(
        settings: &ServerSettings,
        files: Arc<dyn FileSystemHandler>,
        cancel: CancellationToken,
    ) -> Result<Self, ServerError> {
        let runtime = settings.runtime();
        let rng = match settings.fault_injection.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            state: RwLock::new(MockState::default()),
            log: Mutex::new(RequestLog::new(runtime.max_request_log_count)),
            settings: RwLock::new(runtime),
            rng: Mutex::new(rng),
            files,
            proxy: ProxyClient::new()?,
            cancel,
            files_dir: settings.files_directory.clone(),
            mappings_dir: settings.mappings_directory.clone(),
            parse_json: !settings.disable_json_body_parsing,
        })
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn parse_json_bodies(&self) -> bool {
        self.parse_json
    }

    /// A per-request RNG derived from the server RNG. With a fixed seed the
    /// sequence of requests reproduces the same weighted draws and faults.
    pub fn request_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.rng.lock().gen())
    }

    // =========================================================================
    // Serving
    // =========================================================================

    /// Resolve `request` to a response, forwarding upstream when needed.
    pub async fn serve(
        &self,
        request: &RequestMessage,
        settings: &RuntimeSettings,
        rng: &mut StdRng,
    ) -> Served {
        match self.resolve(request, settings, rng).await {
            MatchOutcome::Matched { candidate, action } => {
                debug!(
                    "Request {} {} matched mapping {} (score {:.2})",
                    request.method,
                    request.path,
                    candidate.mapping.guid(),
                    candidate.score
                );
                let (response, proxied) = match action {
                    MappingAction::Respond(response) => (response, false),
                    MappingAction::Forward(base_url) => {
                        match self.proxy.forward(request, &base_url, &self.cancel).await {
                            Ok(upstream) => (proxied_response(upstream), true),
                            Err(e) => (proxy_error_response(e), false),
                        }
                    }
                    MappingAction::Failed(e) => {
                        warn!(
                            "Failed to render response of mapping {}: {}",
                            candidate.mapping.guid(),
                            e
                        );
                        (
                            json_response(
                                StatusCode::INTERNAL_SERVER_ERROR,
                                &json!({ "status": format!("Failed to render response: {e}") }),
                            ),
                            false,
                        )
                    }
                };
                Served {
                    response,
                    mapping: Some(candidate),
                    proxied,
                }
            }
            MatchOutcome::FallThroughProxy(proxy) => {
                match self.proxy.forward(request, &proxy.url, &self.cancel).await {
                    Ok(upstream) => {
                        self.record(request, &upstream, &proxy);
                        Served {
                            response: proxied_response(upstream),
                            mapping: None,
                            proxied: true,
                        }
                    }
                    Err(e) => Served {
                        response: proxy_error_response(e),
                        mapping: None,
                        proxied: false,
                    },
                }
            }
            MatchOutcome::NotFound { closest } => {
                debug!("No mapping found for {} {}", request.method, request.path);
                Served {
                    response: not_found_response(request, closest.as_ref()),
                    mapping: None,
                    proxied: false,
                }
            }
        }
    }

    /// Match, render and apply the scenario transition for `request`.
    pub async fn resolve(
        &self,
        request: &RequestMessage,
        settings: &RuntimeSettings,
        rng: &mut StdRng,
    ) -> MatchOutcome {
        let options = MatchOptions {
            allow_partial: settings.allow_partial_mapping,
            tie_break: settings.tie_break,
        };

        // Without scenarios this is the final match. With scenarios it only
        // predicts the selection, using a copy of the RNG, so that a body file
        // can be read before the write lock is taken.
        let mut predict_rng = rng.clone();
        let (report, scenario_bound) = {
            let state = self.state.read();
            let scenario_bound = state.registry.has_scenarios();
            let draw_rng = if scenario_bound {
                &mut predict_rng
            } else {
                &mut *rng
            };
            let report = state
                .registry
                .find_best_match(request, &state.scenarios, options, draw_rng);
            (report, scenario_bound)
        };
        let files = self.prefetch_body_file(report.selected.as_ref()).await;

        if !scenario_bound {
            return self.outcome(report, request, settings, &files);
        }

        let mut state = self.state.write();
        let report = state
            .registry
            .find_best_match(request, &state.scenarios, options, rng);
        let outcome = self.outcome(report, request, settings, &files);
        if let MatchOutcome::Matched { candidate, action } = &outcome {
            if !matches!(action, MappingAction::Failed(_)) {
                if let (Some(scenario), Some(next)) =
                    (candidate.mapping.scenario(), candidate.mapping.set_state_to())
                {
                    state.scenarios.transition(scenario, next);
                    debug!("Scenario '{}' moved to '{}'", scenario, next);
                }
            }
        }
        outcome
    }

    /// Read the body file of the selected mapping on a blocking task.
    async fn prefetch_body_file(&self, selected: Option<&Candidate>) -> PrefetchedFiles<'_> {
        let mut files = PrefetchedFiles {
            inner: self.files.as_ref(),
            prefetched: None,
        };
        let Some(candidate) = selected else {
            return files;
        };
        let response = &candidate.mapping.model().response;
        if response.proxy_url.is_some() {
            return files;
        }
        let Some(path) = body_file_path(response, &self.files_dir) else {
            return files;
        };

        let handler = Arc::clone(&self.files);
        let read_path = path.clone();
        match tokio::task::spawn_blocking(move || handler.read_file(&read_path)).await {
            Ok(contents) => files.prefetched = Some((path, Mutex::new(Some(contents)))),
            Err(e) => warn!("Reading body file {} failed: {}", path.display(), e),
        }
        files
    }

    fn outcome(
        &self,
        report: MatchReport,
        request: &RequestMessage,
        settings: &RuntimeSettings,
        files: &PrefetchedFiles<'_>,
    ) -> MatchOutcome {
        match report.selected {
            Some(candidate) => {
                let response = &candidate.mapping.model().response;
                let action = match &response.proxy_url {
                    Some(url) => MappingAction::Forward(url.clone()),
                    None => match render(response, request, files, &self.files_dir) {
                        Ok(rendered) => MappingAction::Respond(rendered),
                        Err(e) => MappingAction::Failed(e),
                    },
                };
                MatchOutcome::Matched { candidate, action }
            }
            None => match &settings.proxy_and_record {
                Some(proxy) => MatchOutcome::FallThroughProxy(proxy.clone()),
                None => MatchOutcome::NotFound {
                    closest: report.closest,
                },
            },
        }
    }

    /// Capture an upstream exchange as a mapping when recording is enabled.
    /// Persistence runs on a blocking task; failures are logged only.
    fn record(
        &self,
        request: &RequestMessage,
        upstream: &UpstreamResponse,
        proxy: &ProxyAndRecordSettings,
    ) {
        if !proxy.records() {
            return;
        }
        let pattern = match StatusCodePattern::parse(&proxy.save_mapping_for_status_code_pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!("Recording skipped: {}", e);
                return;
            }
        };
        if !pattern.matches(upstream.status) {
            debug!(
                "Status {} does not match '{}', not recording",
                upstream.status, proxy.save_mapping_for_status_code_pattern
            );
            return;
        }

        let mut model = synthesize_mapping(request, upstream, proxy);
        let guid = *model.guid.get_or_insert_with(Uuid::new_v4);

        if proxy.save_mapping_to_file {
            let files = Arc::clone(&self.files);
            let path = mapping_file_path(&self.mappings_dir, &guid);
            let document = model.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = files.write(&path, &document) {
                    warn!("Failed to persist recorded mapping {}: {}", guid, e);
                } else {
                    debug!("Recorded mapping written to {}", path.display());
                }
            });
        }

        if proxy.save_mapping {
            match self.register(model) {
                Ok(mapping) => info!(
                    "Recorded mapping {} for {} {}",
                    mapping.guid(),
                    request.method,
                    request.path
                ),
                Err(e) => warn!("Failed to register recorded mapping: {}", e),
            }
        }
    }

    // =========================================================================
    // Mappings
    // =========================================================================

    /// Register or replace a mapping.
    pub fn register(&self, model: MappingModel) -> Result<Arc<Mapping>, ConfigError> {
        register_locked(&mut self.state.write(), model)
    }

    /// Register a batch atomically: either every mapping is added or none is.
    /// With `reject_existing`, a guid that is already registered (or repeated
    /// within the batch) fails with `DuplicateMapping`.
    pub fn register_all(
        &self,
        models: Vec<MappingModel>,
        reject_existing: bool,
    ) -> Result<Vec<Arc<Mapping>>, ServerError> {
        for model in &models {
            model.validate()?;
            RequestMatcher::compile(&model.request)?;
        }

        let mut state = self.state.write();
        if reject_existing {
            let mut seen = HashSet::new();
            for guid in models.iter().filter_map(|m| m.guid) {
                if state.registry.contains(guid) || !seen.insert(guid) {
                    return Err(ServerError::DuplicateMapping(guid));
                }
            }
        }

        let mut registered = Vec::with_capacity(models.len());
        for model in models {
            registered.push(register_locked(&mut state, model)?);
        }
        Ok(registered)
    }

    /// Replace the mapping stored under `guid`.
    pub fn update(&self, guid: Uuid, mut model: MappingModel) -> Result<Arc<Mapping>, ServerError> {
        model.guid = Some(guid);
        let mut state = self.state.write();
        if !state.registry.contains(guid) {
            return Err(ServerError::MappingNotFound(guid));
        }
        Ok(register_locked(&mut state, model)?)
    }

    pub fn remove(&self, guid: Uuid) -> Option<Arc<Mapping>> {
        let removed = self.state.write().registry.remove(guid);
        if removed.is_some() {
            debug!("Mapping {} removed", guid);
        }
        removed
    }

    pub fn mapping(&self, guid: Uuid) -> Option<Arc<Mapping>> {
        self.state.read().registry.get(guid)
    }

    pub fn mappings(&self) -> Vec<Arc<Mapping>> {
        self.state.read().registry.list()
    }

    /// Remove every mapping and forget every scenario.
    pub fn reset_mappings(&self) {
        let mut state = self.state.write();
        state.registry.reset();
        state.scenarios.clear();
        debug!("All mappings removed");
    }

    /// Load every mapping document from the mappings directory.
    pub fn load_static_mappings(&self) -> Result<usize, ServerError> {
        let models = self.files.read_all(&self.mappings_dir)?;
        let count = models.len();
        self.register_all(models, false)?;
        info!(
            "Loaded {} static mapping(s) from {}",
            count,
            self.mappings_dir.display()
        );
        Ok(count)
    }

    /// Write every registered mapping to `<mappingsDirectory>/<guid>.json`.
    pub fn save_mappings(&self) -> Result<usize, PersistenceError> {
        let mappings = self.mappings();
        for mapping in &mappings {
            let path = mapping_file_path(&self.mappings_dir, &mapping.guid());
            self.files.write(&path, mapping.model())?;
        }
        info!(
            "Saved {} mapping(s) to {}",
            mappings.len(),
            self.mappings_dir.display()
        );
        Ok(mappings.len())
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    pub fn scenarios(&self) -> Vec<ScenarioState> {
        self.state.read().scenarios.list()
    }

    pub fn reset_scenarios(&self) {
        self.state.write().scenarios.reset();
    }

    /// Returns false when the scenario is unknown.
    pub fn reset_scenario(&self, name: &str) -> bool {
        self.state.write().scenarios.reset_one(name)
    }

    // =========================================================================
    // Request log
    // =========================================================================

    pub fn log(&self, entry: LogEntry) {
        self.log.lock().push(entry);
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.lock().list()
    }

    pub fn log_entry(&self, guid: Uuid) -> Option<LogEntry> {
        self.log.lock().get(guid)
    }

    pub fn reset_log(&self) {
        self.log.lock().clear();
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn settings(&self) -> RuntimeSettings {
        self.settings.read().clone()
    }

    /// Replace the runtime settings after validating them.
    pub fn set_settings(&self, settings: RuntimeSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        self.log.lock().set_max(settings.max_request_log_count);
        *self.settings.write() = settings;
        info!("Runtime settings updated");
        Ok(())
    }

    /// Apply a partial JSON update to the runtime settings.
    pub fn update_settings(&self, patch: Value) -> Result<RuntimeSettings, ConfigError> {
        let updated = self.settings().apply_patch(patch)?;
        self.set_settings(updated.clone())?;
        Ok(updated)
    }

    /// Remove mappings and scenarios and clear the request log.
    pub fn reset(&self) {
        self.reset_mappings();
        self.reset_log();
    }
}

fn proxied_response(upstream: UpstreamResponse) -> RenderedResponse {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    RenderedResponse {
        status,
        headers: upstream.headers,
        body: upstream.body,
        delay: None,
        fault: None,
    }
}

fn proxy_error_response(error: ProxyError) -> RenderedResponse {
    let status = match error {
        ProxyError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    };
    warn!("Proxy request failed: {}", error);
    json_response(status, &json!({ "status": error.to_string() }))
}

fn not_found_response(request: &RequestMessage, closest: Option<&Candidate>) -> RenderedResponse {
    let closest = closest.map(|c| {
        json!({
            "guid": c.mapping.guid(),
            "title": c.mapping.title(),
            "score": c.score,
        })
    });
    json_response(
        StatusCode::NOT_FOUND,
        &json!({
            "status": "No matching mapping found",
            "request": LoggedRequest::from(request),
            "closestMatch": closest,
        }),
    )
}

fn json_response(status: StatusCode, body: &Value) -> RenderedResponse {
    RenderedResponse {
        status,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: Bytes::from(body.to_string()),
        delay: None,
        fault: None,
    }
}

fn register_locked(
    state: &mut MockState,
    model: MappingModel,
) -> Result<Arc<Mapping>, ConfigError> {
    let scenario = model.scenario.clone();
    let mapping = state.registry.register(model)?;
    if let Some(name) = scenario {
        state.scenarios.ensure(&name);
    }
    Ok(mapping)
}

/// Body file reads for one request: the prefetched file is served from memory,
/// anything else goes to the underlying handler.
struct PrefetchedFiles<'a> {
    inner: &'a dyn FileSystemHandler,
    prefetched: Option<(PathBuf, Mutex<Option<Result<Vec<u8>, PersistenceError>>>)>,
}

impl FileSystemHandler for PrefetchedFiles<'_> {
    fn read_all(&self, dir: &Path) -> Result<Vec<MappingModel>, PersistenceError> {
        self.inner.read_all(dir)
    }

    fn write(&self, path: &Path, mapping: &MappingModel) -> Result<(), PersistenceError> {
        self.inner.write(path, mapping)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, PersistenceError> {
        if let Some((prefetched_path, contents)) = &self.prefetched {
            if prefetched_path == path {
                if let Some(contents) = contents.lock().take() {
                    return contents;
                }
            }
        }
        self.inner.read_file(path)
    }
}
