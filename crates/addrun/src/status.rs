//! # Status Categories
//!
//! What the display layer gets to see: a category, which picks the visual
//! style, and a line of text. Nothing structured beyond that.

use crate::bridge::InvokeError;
use crate::bridge::Invocation;
use crate::loader::LoaderState;

/// Status of the runtime panel.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderStatus {
    Loading,
    Ready,
    Error(String),
}

impl LoaderStatus {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error(_) => "error",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Loading => "Loading runtime...".to_string(),
            Self::Ready => "✓ Runtime ready!".to_string(),
            Self::Error(msg) => format!("Error loading runtime: {}", msg),
        }
    }

    /// Whether controls that call into the runtime should be enabled.
    pub fn controls_enabled(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl From<&LoaderState> for LoaderStatus {
    fn from(state: &LoaderState) -> Self {
        match state {
            LoaderState::NotStarted | LoaderState::Loading => Self::Loading,
            LoaderState::Ready(_) => Self::Ready,
            LoaderState::Failed(e) => Self::Error(e.to_string()),
        }
    }
}

impl std::fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Outcome of one call through the bridge, as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeStatus {
    Success(String),
    Error(String),
    /// Transient: the user should wait and try again.
    NotReady,
}

impl InvokeStatus {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Error(_) => "error",
            Self::NotReady => "not-ready",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Success(text) => text.clone(),
            Self::Error(msg) => format!("Error: {}", msg),
            Self::NotReady => "Runtime is not ready yet. Please wait...".to_string(),
        }
    }
}

impl From<std::result::Result<Invocation, InvokeError>> for InvokeStatus {
    fn from(outcome: std::result::Result<Invocation, InvokeError>) -> Self {
        match outcome {
            Ok(invocation) => Self::Success(invocation.message()),
            Err(InvokeError::RuntimeNotReady) => Self::NotReady,
            Err(InvokeError::InvocationFailed(msg)) => Self::Error(msg),
        }
    }
}

impl std::fmt::Display for InvokeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Placeholder category for a panel nothing has been written to yet.
pub const EMPTY_CATEGORY: &str = "empty";
