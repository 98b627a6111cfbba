//! Transports for talking to the module.
//!
//! Two very different physical links carry the same newline-terminated JSON
//! envelopes: a byte-stream UART and a chunked, polled I²C protocol. Both
//! implement [`ModuleLink`], and a [`Context`] owns exactly one link plus
//! the per-request framing, retry, reset-on-error, and debug-trace policy.
//!
//! Transports are strictly synchronous and not re-entrant: at most one
//! transaction is in flight per Context, and callers on multiple threads
//! must serialize through a shared Context or open one Context per
//! physical port.
//!
//! # Example
//!
//! ```rust,ignore
//! use modlink_protocol::{Request, REQ_CARD_STATUS};
//! use modlink_transport::Context;
//!
//! let mut ctx = Context::serial("/dev/ttyUSB0", None)?;
//! let rsp = ctx.transaction(&Request::new(REQ_CARD_STATUS))?;
//! ```

mod context;
mod error;
mod i2c;
mod serial;

pub use context::*;
pub use error::*;
pub use i2c::*;
pub use serial::*;
