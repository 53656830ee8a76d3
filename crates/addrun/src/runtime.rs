//! # Runtime Handle
//!
//! A live engine instance: one Wasmtime engine and store, plus a linker that
//! accumulates named module instances. The runtime image is registered first
//! under [`RUNTIME_MODULE`]; later definitions can import anything it exports.
//!
//! Calls are typed. Arguments travel as native values, never as source text.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use wasmtime::Engine;
use wasmtime::Instance;
use wasmtime::Linker;
use wasmtime::Module;
use wasmtime::Store;

use crate::context::AddrunCtx;

/// Module name the runtime image is registered under.
pub const RUNTIME_MODULE: &str = "runtime";

#[derive(Debug)]
pub enum Error {
    Engine(wasmtime::Error),
    Compile { module: String, source: wasmtime::Error },
    Instantiate { module: String, source: wasmtime::Error },
    AlreadyDefined(String),
    UnknownModule(String),
    Export { module: String, function: String, source: wasmtime::Error },
    Trap(wasmtime::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engine(e) => write!(f, "Engine error: {}", e),
            Self::Compile { module, source } => {
                write!(f, "Failed to compile module '{}': {:#}", module, source)
            }
            Self::Instantiate { module, source } => {
                write!(f, "Failed to instantiate module '{}': {:#}", module, source)
            }
            Self::AlreadyDefined(module) => write!(f, "Module '{}' is already defined", module),
            Self::UnknownModule(module) => write!(f, "Module '{}' is not defined", module),
            Self::Export { module, function, source } => {
                write!(f, "Function '{}.{}' is unusable: {:#}", module, function, source)
            }
            Self::Trap(e) => write!(f, "Runtime error: {:#}", e),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Handle to a loaded runtime.
///
/// Cheap to clone; all clones share the same store. Wasmtime's Store is
/// !Sync, so it sits behind an async mutex and calls are serialized.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Arc<Inner>,
}

struct Inner {
    engine: Engine,
    state: Mutex<State>,
}

struct State {
    store: Store<AddrunCtx>,
    linker: Linker<AddrunCtx>,
    modules: HashMap<String, Instance>,
}

impl RuntimeHandle {
    /// Creates an empty runtime with async support enabled.
    pub fn new() -> Result<Self> {
        let mut config = wasmtime::Config::new();
        config.async_support(true);

        let engine = Engine::new(&config).map_err(Error::Engine)?;
        Ok(Self::with_engine(engine))
    }

    /// Creates an empty runtime on an existing engine.
    pub fn with_engine(engine: Engine) -> Self {
        let store = Store::new(&engine, AddrunCtx::new());
        let linker = Linker::new(&engine);
        Self {
            inner: Arc::new(Inner {
                engine,
                state: Mutex::new(State {
                    store,
                    linker,
                    modules: HashMap::new(),
                }),
            }),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// Compiles `source` (Wasm binary or text), instantiates it against the
    /// modules defined so far and registers its exports under `name`.
    pub async fn define(&self, name: &str, source: &[u8]) -> Result<()> {
        let mut guard = self.inner.state.lock().await;
        let State { store, linker, modules } = &mut *guard;

        if modules.contains_key(name) {
            return Err(Error::AlreadyDefined(name.to_string()));
        }

        let module = Module::new(&self.inner.engine, source).map_err(|source| Error::Compile {
            module: name.to_string(),
            source,
        })?;

        let instance = linker
            .instantiate_async(&mut *store, &module)
            .await
            .map_err(|source| Error::Instantiate {
                module: name.to_string(),
                source,
            })?;

        linker
            .instance(&mut *store, name, instance)
            .map_err(|source| Error::Instantiate {
                module: name.to_string(),
                source,
            })?;
        modules.insert(name.to_string(), instance);

        debug!(
            module = name,
            exports = ?module.exports().map(|export| export.name()).collect::<Vec<_>>(),
            "defined module"
        );
        Ok(())
    }

    /// Calls `module.function` with two `f64` arguments.
    ///
    /// The export must have the exact signature `(f64, f64) -> f64`.
    pub async fn call_binary_f64(&self, module: &str, function: &str, a: f64, b: f64) -> Result<f64> {
        let mut guard = self.inner.state.lock().await;
        let State { store, modules, .. } = &mut *guard;

        let instance = *modules
            .get(module)
            .ok_or_else(|| Error::UnknownModule(module.to_string()))?;

        let func = instance
            .get_typed_func::<(f64, f64), f64>(&mut *store, function)
            .map_err(|source| Error::Export {
                module: module.to_string(),
                function: function.to_string(),
                source,
            })?;

        store.data().record_call();
        func.call_async(&mut *store, (a, b)).await.map_err(Error::Trap)
    }

    /// Names of the modules defined so far, sorted.
    pub async fn modules(&self) -> Vec<String> {
        let guard = self.inner.state.lock().await;
        let mut names: Vec<String> = guard.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of calls dispatched into the runtime, including failed ones.
    pub async fn calls(&self) -> u64 {
        self.inner.state.lock().await.store.data().calls()
    }
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle").finish_non_exhaustive()
    }
}
