//! Note error types.

use thiserror::Error;

/// Errors surfaced by note accessors. The reconciliation operations
/// themselves are total and never fail.
#[derive(Error, Debug)]
pub enum NoteError {
    /// The supplied body text could not be parsed as JSON.
    #[error("note body is not valid JSON: {0}")]
    BodyNotJson(String),
}
