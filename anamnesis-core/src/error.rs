//! Error types for anamnesis-core

use std::path::PathBuf;

use thiserror::Error;

use crate::memory::MemoryError;
use crate::results::StoreError;
use crate::scale::ScaleError;

/// Result type alias using the session error type.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that end a session without a report.
///
/// Oracle failures never appear here: they are absorbed by the
/// parse-or-default adapters in [`crate::oracle`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The run was asked to stop before the session finished.
    #[error("session cancelled")]
    Cancelled,

    /// The responder has no more input (e.g. stdin closed).
    #[error("responder closed")]
    ResponderClosed,

    #[error("scale error: {0}")]
    Scale(#[from] ScaleError),

    /// A memory contract was violated. Signals a bug in the engine.
    #[error("memory state violation: {0}")]
    Memory(#[from] MemoryError),

    #[error("result store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid subject record: {0}")]
    Json(#[from] serde_json::Error),
}
