//! Transport-layer error types.
//!
//! These cover local I/O conditions only. Errors the module itself reports
//! arrive inside a well-formed response's `err` field and are not
//! translated into this enum.

use thiserror::Error;

/// Errors that can occur while moving bytes to and from the module.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The port or bus could not be opened.
    #[error("failed to open {port}: {reason}")]
    Open {
        /// Port or bus path.
        port: String,
        /// Underlying failure text.
        reason: String,
    },

    /// An I/O failure during a transaction.
    #[error("module link I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The port returned EOF immediately; the hardware is gone.
    #[error("hardware failure: port returned EOF")]
    HardwareEof,

    /// The module never returned to its idle state during reset.
    #[error("module did not return to idle during reset")]
    ResetFailed,

    /// The module stopped producing reply bytes mid-transaction.
    #[error("reply timed out after {polls} empty polls")]
    ReplyTimeout {
        /// Probe polls made before giving up.
        polls: u32,
    },

    /// The request or reply was not a valid envelope.
    #[error(transparent)]
    Protocol(#[from] modlink_protocol::ProtocolError),
}
