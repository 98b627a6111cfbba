//! Protocol-layer error types.

use thiserror::Error;

/// Errors that can occur when building or parsing envelope JSON.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The envelope could not be serialized or parsed as JSON.
    #[error("invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A notefile name failed validation.
    #[error("bad notefile name {name:?}: {reason}")]
    BadNotefileName {
        /// The offending name.
        name: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}
