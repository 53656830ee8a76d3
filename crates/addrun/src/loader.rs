//! # Runtime Loader
//!
//! Takes the runtime from "not present" to "ready for calls".
//!
//! 1. Poll the [`EntryRegistry`] on a fixed interval until an entry point is
//!    published or the attempt budget runs out.
//! 2. Boot the entry point to obtain a [`RuntimeHandle`].
//! 3. Register the addition definition under [`DEFINITION_MODULE`].
//!
//! The loader state only moves forward:
//! `NotStarted -> Loading -> Ready | Failed`. Ready and Failed are final for
//! the life of the loader. The handle lives inside `Ready`, so readiness and
//! the handle cannot disagree.
//!
//! State is held in a `watch` channel. The transition out of `NotStarted` is
//! a compare-and-set on that channel, so exactly one `bootstrap` call does the
//! work. Any other call waits for that outcome and returns it.
//!
//! There is no cancellation. If the winning `bootstrap` never finishes because
//! its task panicked or was aborted, the loader settles to
//! `Failed(BootstrapFailed)` so waiters are released.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::LoaderConfig;
use crate::entry::EntryPoint;
use crate::entry::EntryRegistry;
use crate::runtime::RuntimeHandle;
use crate::status::LoaderStatus;

/// Module name the addition definition is registered under.
pub const DEFINITION_MODULE: &str = "main";

/// Cause recorded when the loading task dies before reporting an outcome.
pub const INTERRUPTED: &str = "bootstrap interrupted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No entry point was published within the polling budget.
    RuntimeUnavailable { attempts: u32, waited: Duration },
    /// The entry point, or registering the definition, failed.
    BootstrapFailed(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RuntimeUnavailable { attempts, waited } => write!(
                f,
                "Runtime entry point not available after {} attempts ({:?})",
                attempts, waited
            ),
            Self::BootstrapFailed(cause) => write!(f, "Runtime bootstrap failed: {}", cause),
        }
    }
}

impl std::error::Error for LoadError {}

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Debug, Clone)]
pub enum LoaderState {
    NotStarted,
    Loading,
    Ready(RuntimeHandle),
    Failed(LoadError),
}

impl LoaderState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The final outcome, or `None` while the loader has not settled.
    pub fn outcome(&self) -> Option<Result<RuntimeHandle>> {
        match self {
            Self::NotStarted | Self::Loading => None,
            Self::Ready(handle) => Some(Ok(handle.clone())),
            Self::Failed(e) => Some(Err(e.clone())),
        }
    }
}

/// Shared loader. Clones observe and drive the same state.
#[derive(Clone)]
pub struct RuntimeLoader {
    inner: Arc<Inner>,
}

struct Inner {
    config: LoaderConfig,
    registry: EntryRegistry,
    state: watch::Sender<LoaderState>,
}

impl RuntimeLoader {
    pub fn new(config: LoaderConfig, registry: EntryRegistry) -> Self {
        let (state, _) = watch::channel(LoaderState::NotStarted);
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                state,
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &EntryRegistry {
        &self.inner.registry
    }

    /// Brings the runtime up, or reports why it could not.
    ///
    /// Safe to call any number of times from any number of tasks; only the
    /// first call does any work.
    pub async fn bootstrap(&self) -> Result<RuntimeHandle> {
        let claimed = self.inner.state.send_if_modified(|state| {
            if matches!(state, LoaderState::NotStarted) {
                *state = LoaderState::Loading;
                true
            } else {
                false
            }
        });

        if !claimed {
            debug!("bootstrap already started, waiting for its outcome");
            return self.settled().await;
        }

        let mut guard = LoadingGuard {
            state: &self.inner.state,
            settled: false,
        };

        info!("loading runtime");
        let outcome = self.load().await;

        match &outcome {
            Ok(_) => info!("runtime ready"),
            Err(e) => warn!(error = %e, "runtime failed to load"),
        }

        guard.settle(&outcome);
        outcome
    }

    async fn load(&self) -> Result<RuntimeHandle> {
        let entry = self.wait_for_entry().await?;

        let handle = entry
            .boot()
            .await
            .map_err(|e| LoadError::BootstrapFailed(e.to_string()))?;

        handle
            .define(DEFINITION_MODULE, self.inner.config.definition.as_bytes())
            .await
            .map_err(|e| LoadError::BootstrapFailed(e.to_string()))?;

        Ok(handle)
    }

    async fn wait_for_entry(&self) -> Result<Arc<dyn EntryPoint>> {
        let poll = self.inner.config.poll;
        let mut waits = 0;

        loop {
            if let Some(entry) = self.inner.registry.get() {
                debug!(waits, "entry point available");
                return Ok(entry);
            }
            if waits >= poll.attempts {
                return Err(LoadError::RuntimeUnavailable {
                    attempts: poll.attempts,
                    waited: poll.max_wait(),
                });
            }
            tokio::time::sleep(poll.interval).await;
            waits += 1;
        }
    }

    async fn settled(&self) -> Result<RuntimeHandle> {
        let mut rx = self.inner.state.subscribe();
        let state = rx
            .wait_for(|state| state.outcome().is_some())
            .await
            .map_err(|_| LoadError::BootstrapFailed("loader state channel closed".to_string()))?;

        state
            .outcome()
            .unwrap_or_else(|| Err(LoadError::BootstrapFailed("loader did not settle".to_string())))
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> LoaderState {
        self.inner.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state.borrow().is_ready()
    }

    /// The runtime handle, present exactly when the loader is ready.
    pub fn handle(&self) -> Option<RuntimeHandle> {
        match &*self.inner.state.borrow() {
            LoaderState::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn status(&self) -> LoaderStatus {
        LoaderStatus::from(&*self.inner.state.borrow())
    }

    /// Receives every state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<LoaderState> {
        self.inner.state.subscribe()
    }
}

/// Held by the winning `bootstrap` while it loads. Dropping it without
/// settling, by unwinding or by the future being dropped, fails the loader.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<LoaderState>,
    settled: bool,
}

impl LoadingGuard<'_> {
    fn settle(&mut self, outcome: &Result<RuntimeHandle>) {
        self.state.send_modify(|state| {
            *state = match outcome {
                Ok(handle) => LoaderState::Ready(handle.clone()),
                Err(e) => LoaderState::Failed(e.clone()),
            };
        });
        self.settled = true;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("bootstrap ended without an outcome");
        self.state.send_modify(|state| {
            if matches!(state, LoaderState::Loading) {
                *state = LoaderState::Failed(LoadError::BootstrapFailed(INTERRUPTED.to_string()));
            }
        });
    }
}
