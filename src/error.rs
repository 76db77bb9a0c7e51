//! Error types for capi-init
//!
//! Every failure is terminal: the provisioning sequence halts at the first
//! error and propagates it to the caller with the originating cause attached.
//! There are no retries anywhere in the pipeline.

use thiserror::Error;

use crate::component::Component;

/// Main error type for provisioning operations
#[derive(Debug, Error)]
pub enum Error {
    /// A required executable could not be resolved on PATH
    #[error("{tool} not found. {hint}")]
    ToolNotFound {
        /// Name of the missing executable
        tool: String,
        /// Installation hint shown to the user
        hint: String,
    },

    /// A versioned component was requested without a usable version
    #[error("invalid component {component}: {message}")]
    InvalidComponent {
        /// Component the request was for
        component: Component,
        /// Description of what's missing
        message: String,
    },

    /// Applying a component manifest to the cluster failed
    #[error("failed to apply {component}: {cause}")]
    ApplyFailed {
        /// Component whose apply failed; later stages never run
        component: Component,
        /// Underlying failure, verbatim
        cause: String,
    },

    /// An auxiliary kubectl command failed (e.g. context switching)
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what failed
        message: String,
    },

    /// Filesystem error while staging a rewritten manifest
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a tool-not-found error with an installation hint
    pub fn tool_not_found(tool: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid-component error for the given component
    pub fn invalid_component(component: Component, message: impl Into<String>) -> Self {
        Self::InvalidComponent {
            component,
            message: message.into(),
        }
    }

    /// Create an apply-failed error for the given component
    pub fn apply_failed(component: Component, cause: impl Into<String>) -> Self {
        Self::ApplyFailed {
            component,
            cause: cause.into(),
        }
    }

    /// Create a command-failed error with the given message
    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::CommandFailed {
            message: message.into(),
        }
    }

    /// Get the component this error is associated with, if any
    pub fn component(&self) -> Option<Component> {
        match self {
            Error::InvalidComponent { component, .. } => Some(*component),
            Error::ApplyFailed { component, .. } => Some(*component),
            _ => None,
        }
    }
}
