//! Note replication model.
//!
//! A note is a single replicated record: a structured body, an opaque binary
//! payload, an update counter, a per-endpoint history stack, and a list of
//! conflict siblings retained when concurrent edits cannot be ordered. The
//! operations here — update, compare, subsumption, merge — define how two
//! copies of a record reconcile when they meet, on either side of the link.
//!
//! Everything in this crate is a pure data transform: no I/O, no failure
//! paths beyond body validation, notes passed by value.

mod clock;
mod error;
mod note;

pub(crate) mod base64_payload;

pub use clock::*;
pub use error::*;
pub use note::*;
