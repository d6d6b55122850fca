//! Reachability and model discovery for the local inference runtimes.

use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::generator::Endpoints;
use crate::models::model::{BackendKind, ModelDescriptor};
use crate::registry::ModelRegistry;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub base_url: String,
}

impl BackendDescriptor {
    pub fn new(kind: BackendKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
        }
    }

    /// Discovery path, list field and name field for this runtime.
    fn discovery(&self) -> (&'static str, &'static str, &'static str) {
        match self.kind {
            BackendKind::Ollama => ("/api/tags", "models", "name"),
            BackendKind::LmStudio | BackendKind::LocalAi => ("/v1/models", "data", "id"),
        }
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.discovery().0)
    }
}

/// Descriptors for the three local runtimes at the given endpoints.
pub fn local_backends(endpoints: &Endpoints) -> Vec<BackendDescriptor> {
    [BackendKind::Ollama, BackendKind::LmStudio, BackendKind::LocalAi]
        .into_iter()
        .map(|kind| BackendDescriptor::new(kind, endpoints.local(kind)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub backend: BackendKind,
    pub reachable: bool,
    pub models: Vec<ModelDescriptor>,
}

impl ProbeResult {
    pub fn unreachable(backend: BackendKind) -> Self {
        Self {
            backend,
            reachable: false,
            models: Vec::new(),
        }
    }
}

/// Ask one backend which models it serves. Never fails: any transport
/// error, timeout, error status or undecodable body reads as unreachable.
pub async fn probe(client: &Client, backend: &BackendDescriptor, timeout: Duration) -> ProbeResult {
    let url = backend.url();
    let response = match client.get(&url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("{} probe failed: {}", backend.kind, e);
            return ProbeResult::unreachable(backend.kind);
        }
    };

    if !response.status().is_success() {
        debug!("{} probe returned {}", backend.kind, response.status());
        return ProbeResult::unreachable(backend.kind);
    }

    match response.json::<Value>().await {
        Ok(body) => match parse_models(backend, &body) {
            Some(models) => ProbeResult {
                backend: backend.kind,
                reachable: true,
                models,
            },
            None => {
                debug!("{} probe body has no model list", backend.kind);
                ProbeResult::unreachable(backend.kind)
            }
        },
        Err(e) => {
            debug!("{} probe body could not be decoded: {}", backend.kind, e);
            ProbeResult::unreachable(backend.kind)
        }
    }
}

fn parse_models(backend: &BackendDescriptor, body: &Value) -> Option<Vec<ModelDescriptor>> {
    let (_, list_field, name_field) = backend.discovery();
    let entries = body.get(list_field)?.as_array()?;

    let models = entries
        .iter()
        .filter_map(|entry| {
            let Some(name) = entry.get(name_field).and_then(Value::as_str) else {
                debug!("skipping {} model entry without '{}'", backend.kind, name_field);
                return None;
            };
            let mut model = ModelDescriptor::new(backend.kind, name);
            if backend.kind == BackendKind::Ollama {
                if let Some(size) = entry.get("size").and_then(Value::as_u64) {
                    model = model.with_size(size);
                }
                if let Some(modified) = entry.get("modified_at").and_then(Value::as_str) {
                    model = model.with_last_modified(modified);
                }
            }
            Some(model)
        })
        .collect();
    Some(models)
}

/// Probes a fixed set of backends concurrently.
#[derive(Clone)]
pub struct Prober {
    client: Client,
    backends: Vec<BackendDescriptor>,
    timeout: Duration,
}

impl Prober {
    pub fn new(client: Client, backends: Vec<BackendDescriptor>, timeout: Duration) -> Self {
        Self {
            client,
            backends,
            timeout,
        }
    }

    pub fn backends(&self) -> &[BackendDescriptor] {
        &self.backends
    }

    /// One result per backend, in descriptor order.
    pub async fn probe_all(&self) -> Vec<ProbeResult> {
        join_all(
            self.backends
                .iter()
                .map(|backend| probe(&self.client, backend, self.timeout)),
        )
        .await
    }
}

/// The recurring probe cycle that keeps the registry current.
pub struct ProbeService {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProbeService {
    /// Probe immediately, then every `interval`, publishing each cycle.
    pub fn spawn(prober: Prober, registry: Arc<ModelRegistry>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            info!("probe service started, interval {:?}", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let results = tokio::select! {
                    _ = token.cancelled() => break,
                    results = prober.probe_all() => results,
                };
                // A cycle that finishes after shutdown is discarded
                if token.is_cancelled() {
                    break;
                }
                registry.publish(results);
            }
            info!("probe service stopped");
        });

        Self { cancel, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

impl Drop for ProbeService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
