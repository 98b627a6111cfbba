//! Module wire protocol envelope and shared data contracts.
//!
//! Every exchange with the module is one JSON object each way. A request
//! carries a string discriminator `req` naming the operation; every other
//! field is optional and schema-less to the envelope. A response has the
//! same shape and may additionally carry an `err` string with embedded
//! brace-tagged machine tokens such as `{io}` or `{timeout}`.
//!
//! The schema is append-only: unknown fields must survive a round-trip and
//! be ignored on receipt, which the envelope implements with a flattened
//! extras map.
//!
//! # Example
//!
//! ```rust,ignore
//! use modlink_protocol::{Request, REQ_NOTE_ADD};
//!
//! let mut req = Request::new(REQ_NOTE_ADD);
//! req.file = Some("sensors.qo".to_string());
//! let line = req.to_json_line()?;
//! ```

mod error;
mod event;
mod notefile;
mod request;
mod tokens;

pub(crate) mod base64_payload;

pub use error::*;
pub use event::*;
pub use notefile::*;
pub use request::*;
pub use tokens::*;
