//! # Bootstrap Entry Points
//!
//! An entry point is whatever knows how to bring up a runtime. It may become
//! available later than the loader starts looking for it (for example when
//! the host publishes it from a task that is still loading), so it is handed
//! over through an [`EntryRegistry`] rather than looked up globally.

use std::sync::Arc;
use std::sync::OnceLock;

use tracing::info;

use crate::image::ImageLocation;
use crate::runtime::RUNTIME_MODULE;
use crate::runtime::RuntimeHandle;

#[derive(Debug)]
pub enum Error {
    Image(crate::image::Error),
    Runtime(crate::runtime::Error),
    Other(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(e) => write!(f, "{}", e),
            Self::Runtime(e) => write!(f, "{}", e),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<crate::image::Error> for Error {
    fn from(e: crate::image::Error) -> Self {
        Self::Image(e)
    }
}

impl From<crate::runtime::Error> for Error {
    fn from(e: crate::runtime::Error) -> Self {
        Self::Runtime(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Brings a runtime from nothing to a usable handle.
///
/// This trait is object-safe (`Arc<dyn EntryPoint>`).
#[async_trait::async_trait]
pub trait EntryPoint: Send + Sync + 'static {
    /// Fetches and initializes a runtime. May be slow; must not block.
    async fn boot(&self) -> Result<RuntimeHandle>;
}

/// Entry point that loads a Wasm runtime image from an [`ImageLocation`].
#[derive(Clone, Debug)]
pub struct WasmEntry {
    location: ImageLocation,
}

impl WasmEntry {
    pub fn new(location: ImageLocation) -> Self {
        Self { location }
    }

    pub fn location(&self) -> &ImageLocation {
        &self.location
    }
}

#[async_trait::async_trait]
impl EntryPoint for WasmEntry {
    async fn boot(&self) -> Result<RuntimeHandle> {
        let bytes = self.location.fetch().await?;
        let handle = RuntimeHandle::new()?;
        handle.define(RUNTIME_MODULE, &bytes).await?;
        info!(image = %self.location, "runtime image loaded");
        Ok(handle)
    }
}

/// Slot through which the host publishes its entry point, at most once.
#[derive(Clone, Default)]
pub struct EntryRegistry {
    slot: Arc<OnceLock<Arc<dyn EntryPoint>>>,
}

impl EntryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `entry` available. Returns false if an entry was already published.
    pub fn publish(&self, entry: Arc<dyn EntryPoint>) -> bool {
        self.slot.set(entry).is_ok()
    }

    pub fn get(&self) -> Option<Arc<dyn EntryPoint>> {
        self.slot.get().cloned()
    }

    pub fn is_published(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl std::fmt::Debug for EntryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryRegistry")
            .field("published", &self.is_published())
            .finish()
    }
}
