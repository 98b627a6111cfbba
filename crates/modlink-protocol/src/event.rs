//! Hub event contract.
//!
//! When a note reaches the hub it is emitted as an `event` record carrying
//! the note's content plus routing metadata and a per-route status log.
//! These layouts are owned by the hub and implemented field-for-field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::base64_payload;

/// One event emitted by the hub for a note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event UID.
    #[serde(rename = "event", default, skip_serializing_if = "String::is_empty")]
    pub event: String,

    /// Session UID the note arrived in.
    #[serde(rename = "session", skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,

    /// Device UID that authored the note.
    #[serde(rename = "device", skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Device serial number.
    #[serde(rename = "sn", skip_serializing_if = "Option::is_none")]
    pub sn: Option<String>,

    /// Product UID.
    #[serde(rename = "product", skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,

    /// App UID.
    #[serde(rename = "app", skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,

    /// When the hub received the note, seconds since epoch with fractional
    /// precision.
    #[serde(rename = "received", skip_serializing_if = "Option::is_none")]
    pub received: Option<f64>,

    /// Operation that produced the event.
    #[serde(rename = "req", skip_serializing_if = "Option::is_none")]
    pub req: Option<String>,

    /// When the note was authored, seconds since epoch.
    #[serde(rename = "when", skip_serializing_if = "Option::is_none")]
    pub when: Option<i64>,

    /// Notefile the note belongs to.
    #[serde(rename = "file", skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Note id within the notefile.
    #[serde(rename = "note", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Update count of the note at emission time.
    #[serde(rename = "updates", skip_serializing_if = "Option::is_none")]
    pub updates: Option<i64>,

    /// Tombstone flag.
    #[serde(rename = "deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    /// The note's structured body.
    #[serde(rename = "body", skip_serializing_if = "Option::is_none")]
    pub body: Option<Map<String, Value>>,

    /// The note's binary payload, base64 on the wire.
    #[serde(
        rename = "payload",
        default,
        with = "base64_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Vec<u8>>,

    /// Per-route delivery log, newest last.
    #[serde(rename = "status", default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<RouteLogEntry>,
}

/// One route-delivery attempt recorded on an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLogEntry {
    /// Route UID.
    #[serde(rename = "route", default, skip_serializing_if = "String::is_empty")]
    pub route: String,

    /// Outcome text, free-form.
    #[serde(rename = "status", default, skip_serializing_if = "String::is_empty")]
    pub status: String,

    /// Delivery attempts made so far.
    #[serde(rename = "attempts", default, skip_serializing_if = "is_zero_u32")]
    pub attempts: u32,

    /// When the attempt finished, seconds since epoch.
    #[serde(rename = "when", default, skip_serializing_if = "is_zero_i64")]
    pub when: i64,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_roundtrip() {
        let wire = br#"{"event":"evt:1","device":"dev:abc","file":"data.qo","note":"n1",
            "when":1700000000,"body":{"temp":21.5},
            "status":[{"route":"route:1","status":"completed","attempts":1,"when":1700000100}]}"#;
        let event: Event = serde_json::from_slice(wire).unwrap();
        assert_eq!(event.event, "evt:1");
        assert_eq!(event.device.as_deref(), Some("dev:abc"));
        assert_eq!(event.status.len(), 1);
        assert_eq!(event.status[0].route, "route:1");
        assert_eq!(event.status[0].attempts, 1);

        let out = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&out).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_empty_event_is_compact() {
        let event = Event::default();
        assert_eq!(serde_json::to_string(&event).unwrap(), "{}");
    }
}
