use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::model::{BackendKind, ModelDescriptor, ModelKey};
use crate::probe::ProbeResult;

/// Flatten probe results into one model list.
///
/// Reachable results contribute their models in input order, stamped with
/// the result's backend and `active = false`. Unreachable results contribute
/// nothing, even if they carry models. No deduplication.
pub fn aggregate(results: &[ProbeResult]) -> Vec<ModelDescriptor> {
    results
        .iter()
        .filter(|result| result.reachable)
        .flat_map(|result| {
            result.models.iter().map(move |model| ModelDescriptor {
                backend: result.backend,
                active: false,
                ..model.clone()
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub backend: BackendKind,
    pub name: String,
    pub reachable: bool,
    pub model_count: usize,
}

#[derive(Default)]
struct Published {
    models: Arc<Vec<ModelDescriptor>>,
    results: Arc<Vec<ProbeResult>>,
}

/// The most recent probe cycle, replaced wholesale on every publish.
#[derive(Default)]
pub struct ModelRegistry {
    inner: RwLock<Published>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, results: Vec<ProbeResult>) {
        let models = aggregate(&results);
        *self.inner.write() = Published {
            models: Arc::new(models),
            results: Arc::new(results),
        };
    }

    pub fn snapshot(&self) -> Arc<Vec<ModelDescriptor>> {
        self.inner.read().models.clone()
    }

    pub fn results(&self) -> Arc<Vec<ProbeResult>> {
        self.inner.read().results.clone()
    }

    /// Whether the last cycle reached `backend`. Unknown before the first
    /// cycle, which reads as unreachable.
    pub fn is_reachable(&self, backend: BackendKind) -> bool {
        self.inner
            .read()
            .results
            .iter()
            .any(|result| result.backend == backend && result.reachable)
    }

    pub fn status(&self) -> Vec<BackendStatus> {
        self.inner
            .read()
            .results
            .iter()
            .map(|result| BackendStatus {
                backend: result.backend,
                name: result.backend.to_string(),
                reachable: result.reachable,
                model_count: if result.reachable {
                    result.models.len()
                } else {
                    0
                },
            })
            .collect()
    }
}

/// The set of models a user has switched on. Held by the caller, never by
/// the registry, so it survives probe cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveModels {
    keys: HashSet<ModelKey>,
}

impl ActiveModels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the set changed.
    pub fn set(&mut self, key: ModelKey, active: bool) -> bool {
        if active {
            self.keys.insert(key)
        } else {
            self.keys.remove(&key)
        }
    }

    pub fn contains(&self, key: &ModelKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// A copy of `models` with `active` set for every key in the set.
    pub fn apply(&self, models: &[ModelDescriptor]) -> Vec<ModelDescriptor> {
        models
            .iter()
            .map(|model| ModelDescriptor {
                active: self.keys.contains(&model.key()),
                ..model.clone()
            })
            .collect()
    }
}
