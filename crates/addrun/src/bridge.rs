//! # Bridge Invoker
//!
//! Forwards an addition into the loaded runtime and reports the result.
//! Calls are gated on loader readiness and never touch loader state.

use tracing::debug;

use crate::loader::DEFINITION_MODULE;
use crate::loader::RuntimeLoader;
use crate::status::InvokeStatus;

/// Export the bridge calls in the definition module.
pub const ADD_FUNCTION: &str = "add_numbers";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// The loader is not ready. Transient; the caller may try again later.
    RuntimeNotReady,
    /// The runtime rejected this call. Carries the runtime's error text.
    InvocationFailed(String),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RuntimeNotReady => write!(f, "Runtime is not ready"),
            Self::InvocationFailed(msg) => write!(f, "Invocation failed: {}", msg),
        }
    }
}

impl std::error::Error for InvokeError {}

pub type Result<T> = std::result::Result<T, InvokeError>;

/// A successful call and its result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Invocation {
    pub a: f64,
    pub b: f64,
    pub value: f64,
}

impl Invocation {
    pub fn message(&self) -> String {
        format!(
            "Runtime result: {}({}, {}) = {}",
            ADD_FUNCTION, self.a, self.b, self.value
        )
    }
}

#[derive(Clone)]
pub struct BridgeInvoker {
    loader: RuntimeLoader,
}

impl BridgeInvoker {
    pub fn new(loader: RuntimeLoader) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &RuntimeLoader {
        &self.loader
    }

    /// Adds `a` and `b` inside the runtime.
    ///
    /// Inputs are expected to be finite and are not re-validated. Each call
    /// is a single attempt.
    pub async fn invoke(&self, a: f64, b: f64) -> Result<Invocation> {
        let handle = self.loader.handle().ok_or(InvokeError::RuntimeNotReady)?;

        let value = handle
            .call_binary_f64(DEFINITION_MODULE, ADD_FUNCTION, a, b)
            .await
            .map_err(|e| InvokeError::InvocationFailed(e.to_string()))?;

        debug!(a, b, value, "invocation complete");
        Ok(Invocation { a, b, value })
    }

    /// [`invoke`](Self::invoke), folded into a display status.
    pub async fn invoke_status(&self, a: f64, b: f64) -> InvokeStatus {
        InvokeStatus::from(self.invoke(a, b).await)
    }
}
