//! Engine lifecycle: lazily loaded generative models with single-flight loading
//!
//! Each distinct model gets one [`EngineHandle`]. Its state is
//! `idle -> loading -> loaded`. The only shared mutable state is the current
//! state slot; a load in progress is represented by one shared future that
//! every caller (explicit or background) awaits, so two loads of the same
//! model never overlap.

pub mod llama_server;

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::error::EngineError;

pub use llama_server::LlamaServerBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Loading,
    Loaded,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Idle => write!(f, "idle"),
            EngineStatus::Loading => write!(f, "loading"),
            EngineStatus::Loaded => write!(f, "loaded"),
        }
    }
}

/// Which model file an engine serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub name: String,
    pub path: PathBuf,
}

impl ModelRef {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Something that can turn a model file into a running model.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn load(&self, model: &ModelRef) -> anyhow::Result<Arc<dyn LoadedModel>>;
}

/// A resident model.
#[async_trait]
pub trait LoadedModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;

    /// Free whatever the model holds (process, memory).
    async fn release(&self) -> anyhow::Result<()>;
}

type LoadResult = Result<Arc<dyn LoadedModel>, Arc<anyhow::Error>>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

enum EngineState {
    Idle,
    Loading { id: u64, load: SharedLoad },
    Loaded(Arc<dyn LoadedModel>),
}

impl EngineState {
    fn status(&self) -> EngineStatus {
        match self {
            EngineState::Idle => EngineStatus::Idle,
            EngineState::Loading { .. } => EngineStatus::Loading,
            EngineState::Loaded(_) => EngineStatus::Loaded,
        }
    }
}

pub struct EngineHandle {
    model: ModelRef,
    backend: Arc<dyn ModelBackend>,
    state: Arc<Mutex<EngineState>>,
    next_load_id: AtomicU64,
}

impl EngineHandle {
    pub fn new(model: ModelRef, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            model,
            backend,
            state: Arc::new(Mutex::new(EngineState::Idle)),
            next_load_id: AtomicU64::new(1),
        }
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    pub fn name(&self) -> &str {
        &self.model.name
    }

    pub fn status(&self) -> EngineStatus {
        self.state.lock().status()
    }

    /// Identifier of the load currently in flight, if any.
    pub fn in_flight_load(&self) -> Option<u64> {
        match &*self.state.lock() {
            EngineState::Loading { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Return the resident model, loading it (or joining a running load) first.
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn LoadedModel>, EngineError> {
        let load = {
            let mut state = self.state.lock();
            let existing = match &*state {
                EngineState::Loaded(model) => return Ok(Arc::clone(model)),
                EngineState::Loading { load, .. } => Some(load.clone()),
                EngineState::Idle => None,
            };
            existing.unwrap_or_else(|| self.begin_load(&mut state))
        };

        load.await.map_err(|e| EngineError::LoadFailed {
            model: self.model.name.clone(),
            message: format!("{:#}", e),
        })
    }

    /// Start loading without waiting. No-op unless idle; returns whether a load started.
    pub fn load_in_background(&self) -> bool {
        let load = {
            let mut state = self.state.lock();
            if !matches!(*state, EngineState::Idle) {
                return false;
            }
            self.begin_load(&mut state)
        };

        tracing::debug!(engine = %self.model.name, "Prefetching engine");
        tokio::spawn(async move {
            let _ = load.await;
        });
        true
    }

    /// Release the resident model. Only valid while loaded.
    pub async fn unload(&self) -> Result<(), EngineError> {
        let model = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, EngineState::Idle) {
                EngineState::Loaded(model) => model,
                other => {
                    let status = other.status();
                    *state = other;
                    return Err(EngineError::InvalidState {
                        model: self.model.name.clone(),
                        action: "unload",
                        status,
                    });
                }
            }
        };

        if let Err(e) = model.release().await {
            tracing::warn!(engine = %self.model.name, error = %e, "Engine release reported an error");
        }
        tracing::info!(engine = %self.model.name, "Engine unloaded");
        Ok(())
    }

    /// Generate a completion, loading the model first if needed.
    pub async fn generate(&self, prompt: &str) -> Result<String, EngineError> {
        let model = self.ensure_loaded().await?;
        model
            .generate(prompt)
            .await
            .map_err(|e| EngineError::Generation {
                model: self.model.name.clone(),
                message: format!("{:#}", e),
            })
    }

    /// Install a new shared load future. Caller holds the lock and has seen `Idle`.
    fn begin_load(&self, state: &mut EngineState) -> SharedLoad {
        let id = self.next_load_id.fetch_add(1, Ordering::Relaxed);
        let backend = Arc::clone(&self.backend);
        let model = self.model.clone();
        let slot = Arc::clone(&self.state);

        let load = async move {
            tracing::info!(engine = %model.name, path = ?model.path, "Loading engine");
            let result = backend.load(&model).await.map_err(Arc::new);
            match &result {
                Ok(_) => tracing::info!(engine = %model.name, "Engine loaded"),
                Err(e) => tracing::warn!(engine = %model.name, error = %e, "Engine load failed"),
            }
            finish_load(&slot, id, &result);
            result
        }
        .boxed()
        .shared();

        *state = EngineState::Loading {
            id,
            load: load.clone(),
        };
        load
    }
}

/// Record a load outcome, unless the slot has moved on to a different load.
fn finish_load(slot: &Mutex<EngineState>, id: u64, result: &LoadResult) {
    let mut state = slot.lock();
    if matches!(&*state, EngineState::Loading { id: current, .. } if *current == id) {
        *state = match result {
            Ok(model) => EngineState::Loaded(Arc::clone(model)),
            Err(_) => EngineState::Idle,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingBackend {
        loads: AtomicUsize,
        releases: Arc<AtomicUsize>,
        fail_first: bool,
    }

    struct EchoModel {
        releases: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LoadedModel for EchoModel {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            Ok(format!("echo: {}", prompt))
        }

        async fn release(&self) -> anyhow::Result<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl ModelBackend for CountingBackend {
        async fn load(&self, _model: &ModelRef) -> anyhow::Result<Arc<dyn LoadedModel>> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            if self.fail_first && attempt == 0 {
                anyhow::bail!("model file is corrupt");
            }
            Ok(Arc::new(EchoModel {
                releases: Arc::clone(&self.releases),
            }))
        }
    }

    fn handle(backend: Arc<CountingBackend>) -> Arc<EngineHandle> {
        Arc::new(EngineHandle::new(
            ModelRef::new("tiny", "/models/tiny.gguf"),
            backend,
        ))
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let backend = Arc::new(CountingBackend::default());
        let engine = handle(Arc::clone(&backend));

        let callers = (0..8).map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.ensure_loaded().await.is_ok() })
        });
        for result in futures::future::join_all(callers).await {
            assert!(result.unwrap());
        }

        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
        assert_eq!(engine.status(), EngineStatus::Loaded);
    }

    #[tokio::test]
    async fn background_load_is_noop_unless_idle() {
        let backend = Arc::new(CountingBackend::default());
        let engine = handle(Arc::clone(&backend));

        assert!(engine.load_in_background());
        assert_eq!(engine.status(), EngineStatus::Loading);
        let in_flight = engine.in_flight_load();
        assert!(in_flight.is_some());

        assert!(!engine.load_in_background());
        assert_eq!(engine.status(), EngineStatus::Loading);
        assert_eq!(engine.in_flight_load(), in_flight);

        engine.ensure_loaded().await.unwrap();
        assert!(!engine.load_in_background());
        assert_eq!(engine.status(), EngineStatus::Loaded);
        assert_eq!(engine.in_flight_load(), None);
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_returns_to_idle_and_can_retry() {
        let backend = Arc::new(CountingBackend {
            fail_first: true,
            ..Default::default()
        });
        let engine = handle(Arc::clone(&backend));

        let err = engine.ensure_loaded().await.err().unwrap();
        assert!(matches!(err, EngineError::LoadFailed { .. }));
        assert!(err.to_string().contains("corrupt"));
        assert_eq!(engine.status(), EngineStatus::Idle);

        engine.ensure_loaded().await.unwrap();
        assert_eq!(backend.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unload_only_from_loaded() {
        let backend = Arc::new(CountingBackend::default());
        let engine = handle(Arc::clone(&backend));

        let err = engine.unload().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                status: EngineStatus::Idle,
                ..
            }
        ));

        engine.ensure_loaded().await.unwrap();
        engine.unload().await.unwrap();
        assert_eq!(engine.status(), EngineStatus::Idle);
        assert_eq!(backend.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generate_loads_on_demand() {
        let backend = Arc::new(CountingBackend::default());
        let engine = handle(Arc::clone(&backend));

        assert_eq!(engine.generate("hi").await.unwrap(), "echo: hi");
        assert_eq!(engine.status(), EngineStatus::Loaded);
        assert_eq!(engine.generate("again").await.unwrap(), "echo: again");
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
    }
}
