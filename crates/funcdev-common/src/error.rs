//! Error types for the dev server.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`DevServerError`]: Top-level errors for the dev server
//! - [`TunnelError`]: Errors from the tunnel control plane

use std::io;

use thiserror::Error;

/// Top-level dev server errors.
///
/// These errors represent failures across the rebuild pipeline, from the
/// digest read through staging, compilation, module loading, and request
/// handling. A build-stage error fails the current rebuild pass but not the
/// process; the previously published route table stays authoritative.
#[derive(Error, Debug)]
pub enum DevServerError {
    /// The digest manifest exists but could not be read or parsed.
    #[error("Invalid digest at {path}: {reason}")]
    Digest {
        /// Path of the digest file.
        path: String,
        /// Description of the read or parse failure.
        reason: String,
    },

    /// Installation of a digest dependency failed.
    #[error("Failed to install '{module}': {output}")]
    InstallFailed {
        /// The dependency that failed to install.
        module: String,
        /// Captured command output.
        output: String,
    },

    /// The external compiler exited with a failure.
    #[error("Compilation failed: {output}")]
    CompileFailed {
        /// Captured command output.
        output: String,
    },

    /// A compiled output file could not be loaded as a module.
    ///
    /// Loader-level code records this per file and skips only that file;
    /// it only escalates when a whole artifact directory is unreadable.
    #[error("Failed to load module {path}: {reason}")]
    ModuleLoad {
        /// Path of the compiled output file.
        path: String,
        /// Description of the load failure.
        reason: String,
    },

    /// A guest handler trapped or produced an unusable response.
    #[error("Handler invocation failed: {reason}")]
    Invocation {
        /// Description of the invocation failure.
        reason: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Tunnel control-plane operation failed.
    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    /// I/O operation failed (staging workspace, artifact scan).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DevServerError {
    /// Create a [`DevServerError::Digest`] error.
    pub fn digest(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Digest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a [`DevServerError::CompileFailed`] error.
    pub fn compile_failed(output: impl Into<String>) -> Self {
        Self::CompileFailed {
            output: output.into(),
        }
    }

    /// Create a [`DevServerError::ModuleLoad`] error.
    pub fn module_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a [`DevServerError::Invocation`] error.
    pub fn invocation(reason: impl Into<String>) -> Self {
        Self::Invocation {
            reason: reason.into(),
        }
    }

    /// Create a [`DevServerError::InvalidConfig`] error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Errors from the tunnel control plane.
///
/// Defined here rather than in the tunnel crate so that the top-level
/// error can fold them in with `#[from]`.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// The control plane answered with a non-success status.
    #[error("Control plane rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the control plane.
        status: u16,
        /// Human-readable message from the response body, if any.
        message: String,
    },

    /// The request never reached the control plane.
    #[error("Failed to reach control plane: {reason}")]
    Transport {
        /// Description of the transport failure.
        reason: String,
    },
}

impl TunnelError {
    /// Create a [`TunnelError::Rejected`] error.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Create a [`TunnelError::Transport`] error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}
