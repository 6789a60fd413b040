//! Error types for runtime setup.
//!
//! Covers everything that can go wrong before the first dispatch: reading
//! configuration and manifests, binding bodies to declarations, building the
//! registry and starting the worker pool. Per-dispatch failures use
//! [`DispatchError`](command_dispatch_core::DispatchError) instead.

use command_dispatch_core::BuildError;
use thiserror::Error;

/// Errors raised while preparing a dispatcher.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Tree or registry construction failure.
    #[error("registry build failed: {0}")]
    BuildError(#[from] BuildError),

    /// A declared command has no body bound to it.
    #[error("no body bound for command: {0}")]
    MissingBody(String),

    /// A `subcommands` entry names a command that is not declared.
    #[error("command {parent} lists unknown subcommand {child}")]
    UnknownSubcommand { parent: String, child: String },

    /// A command was given two different parents.
    #[error("command {child} has conflicting parents: {first} and {second}")]
    ConflictingParent {
        child: String,
        first: String,
        second: String,
    },

    /// The worker pool could not be started.
    #[error("worker pool error: {0}")]
    PoolError(#[from] rayon::ThreadPoolBuildError),
}

/// Convenience alias for results with [`RuntimeError`].
pub type Result<T> = std::result::Result<T, RuntimeError>;
