//! The request/response envelope.
//!
//! One struct carries both directions: a response is a request-shaped object
//! that may also carry `err`. Only `req` is required; the rest of the tail is
//! optional and omitted from the JSON when unset. Fields this crate does not
//! know about are preserved verbatim in the flattened extras map so an old
//! host round-trips envelopes from a newer module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::base64_payload;
use crate::notefile::{NoteInfo, NotefileInfo};
use crate::tokens::error_contains;
use crate::ProtocolError;

// ============================================================================
// Operation names (host → module)
// ============================================================================

/// Add a note to a notefile.
pub const REQ_NOTE_ADD: &str = "note.add";
/// Get a note from a notefile.
pub const REQ_NOTE_GET: &str = "note.get";
/// Update a note in a database notefile.
pub const REQ_NOTE_UPDATE: &str = "note.update";
/// Delete a note from a database notefile.
pub const REQ_NOTE_DELETE: &str = "note.delete";
/// Enumerate changed notes in a notefile.
pub const REQ_NOTE_CHANGES: &str = "note.changes";
/// Enumerate changed notefiles.
pub const REQ_FILE_CHANGES: &str = "file.changes";
/// Delete notefiles.
pub const REQ_FILE_DELETE: &str = "file.delete";
/// Query hub connection status.
pub const REQ_HUB_STATUS: &str = "hub.status";
/// Request an immediate sync with the hub.
pub const REQ_HUB_SYNC: &str = "hub.sync";
/// Set hub connection parameters.
pub const REQ_HUB_SET: &str = "hub.set";
/// Query module status.
pub const REQ_CARD_STATUS: &str = "card.status";
/// Restart the module.
pub const REQ_CARD_RESTART: &str = "card.restart";
/// Query module firmware version.
pub const REQ_CARD_VERSION: &str = "card.version";
/// Get or set module time.
pub const REQ_CARD_TIME: &str = "card.time";
/// Query firmware-update status.
pub const REQ_DFU_STATUS: &str = "dfu.status";

/// A request to, or response from, the module.
///
/// The schema is append-only and schema-less beyond `req`: senders set the
/// fields their operation uses, receivers ignore fields they do not
/// understand and keep them in `extras`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Operation discriminator. The one mandatory field.
    #[serde(rename = "req", default, skip_serializing_if = "String::is_empty")]
    pub req: String,

    /// Correlation id echoed back by the module.
    #[serde(rename = "id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,

    /// Error text, present only on responses. Free text with embedded
    /// `{token}` markers.
    #[serde(rename = "err", skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,

    /// Notefile name.
    #[serde(rename = "file", skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Note id within a notefile.
    #[serde(rename = "note", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Opaque structured body.
    #[serde(rename = "body", skip_serializing_if = "Option::is_none")]
    pub body: Option<Map<String, Value>>,

    /// Opaque binary payload, base64 on the wire.
    #[serde(
        rename = "payload",
        default,
        with = "base64_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Vec<u8>>,

    /// Tombstone flag on note operations.
    #[serde(rename = "deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    /// Request deletion of the returned note.
    #[serde(rename = "delete", default, skip_serializing_if = "is_false")]
    pub delete: bool,

    /// Start a changes scan from the beginning.
    #[serde(rename = "start", default, skip_serializing_if = "is_false")]
    pub start: bool,

    /// Stop a changes scan and discard the tracker.
    #[serde(rename = "stop", default, skip_serializing_if = "is_false")]
    pub stop: bool,

    /// Request a sync after the operation completes.
    #[serde(rename = "sync", default, skip_serializing_if = "is_false")]
    pub sync: bool,

    /// Verify-only mode.
    #[serde(rename = "verify", default, skip_serializing_if = "is_false")]
    pub verify: bool,

    /// Maximum number of items to return.
    #[serde(rename = "max", skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,

    /// Count of changes pending, on responses.
    #[serde(rename = "changes", skip_serializing_if = "Option::is_none")]
    pub changes: Option<i64>,

    /// Total count of items, on responses.
    #[serde(rename = "total", skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,

    /// A duration in seconds, operation-specific.
    #[serde(rename = "seconds", skip_serializing_if = "Option::is_none")]
    pub seconds: Option<i64>,

    /// A moment in time, seconds since epoch.
    #[serde(rename = "time", skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,

    /// Mode string, operation-specific.
    #[serde(rename = "mode", skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Hub host name.
    #[serde(rename = "host", skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Product UID.
    #[serde(rename = "product", skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,

    /// Device UID.
    #[serde(rename = "device", skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Status text, on responses.
    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Change-tracker name for incremental scans.
    #[serde(rename = "tracker", skip_serializing_if = "Option::is_none")]
    pub tracker: Option<String>,

    /// Notefile-name → notefile-info map, on `file.changes` responses.
    #[serde(rename = "info", skip_serializing_if = "Option::is_none")]
    pub info: Option<BTreeMap<String, NotefileInfo>>,

    /// Note-id → note-info map, on `note.changes` responses.
    #[serde(rename = "notes", skip_serializing_if = "Option::is_none")]
    pub notes: Option<BTreeMap<String, NoteInfo>>,

    /// Fields this version of the envelope does not know about, preserved
    /// on round-trip.
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

/// A response is request-shaped with `err` possibly set.
pub type Response = Request;

fn is_false(v: &bool) -> bool {
    !*v
}

impl Request {
    /// Create a request for the named operation.
    pub fn new(req: &str) -> Self {
        Request {
            req: req.to_string(),
            ..Default::default()
        }
    }

    /// Serialize to a single newline-terminated JSON line, ready for the
    /// wire.
    pub fn to_json_line(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Parse an envelope from reply bytes (with or without the trailing
    /// newline).
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// True if this is a response carrying a non-empty error.
    pub fn is_error(&self) -> bool {
        self.err.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// True if the response error contains the given `{token}`.
    pub fn has_error_token(&self, token: &str) -> bool {
        self.err
            .as_deref()
            .is_some_and(|e| error_contains(e, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{ERR_IO, ERR_TIMEOUT};

    #[test]
    fn test_minimal_request_wire_form() {
        let req = Request::new(REQ_CARD_STATUS);
        let line = req.to_json_line().unwrap();
        assert_eq!(line, b"{\"req\":\"card.status\"}\n");
    }

    #[test]
    fn test_unset_fields_omitted() {
        let mut req = Request::new(REQ_NOTE_ADD);
        req.file = Some("sensors.qo".to_string());
        let text = String::from_utf8(req.to_json_line().unwrap()).unwrap();
        assert!(text.contains("\"file\":\"sensors.qo\""));
        assert!(!text.contains("\"deleted\""));
        assert!(!text.contains("\"payload\""));
        assert!(!text.contains("\"err\""));
    }

    #[test]
    fn test_payload_is_base64() {
        let mut req = Request::new(REQ_NOTE_ADD);
        req.payload = Some(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let text = String::from_utf8(req.to_json_line().unwrap()).unwrap();
        assert!(text.contains("\"payload\":\"3q2+7w==\""));

        let back = Request::from_json(text.as_bytes()).unwrap();
        assert_eq!(back.payload, Some(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn test_unknown_fields_roundtrip() {
        let wire = br#"{"req":"card.status","future-field":{"nested":true},"n":7}"#;
        let req = Request::from_json(wire).unwrap();
        assert_eq!(req.req, "card.status");
        assert_eq!(req.extras.len(), 2);

        let out = String::from_utf8(req.to_json_line().unwrap()).unwrap();
        assert!(out.contains("\"future-field\":{\"nested\":true}"));
        assert!(out.contains("\"n\":7"));
    }

    #[test]
    fn test_error_token_predicate() {
        let mut rsp = Response::new("");
        rsp.err = Some("can't reach service {io} {network}".to_string());
        assert!(rsp.is_error());
        assert!(rsp.has_error_token(ERR_IO));
        assert!(!rsp.has_error_token(ERR_TIMEOUT));
    }

    #[test]
    fn test_info_maps_roundtrip() {
        let wire = br#"{"req":"file.changes","info":{"data.qo":{"changes":3,"total":9}}}"#;
        let rsp = Response::from_json(wire).unwrap();
        let info = rsp.info.as_ref().unwrap();
        assert_eq!(info["data.qo"].changes, 3);
        assert_eq!(info["data.qo"].total, 9);
    }
}
