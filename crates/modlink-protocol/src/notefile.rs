//! Notefile data contracts.
//!
//! A notefile is addressed by name; the suffix encodes its behavior. `.qo`
//! is an outbound queue, `.qi` an inbound queue, `.db` a database. The
//! secure/synced variants `.qos`, `.qis`, and `.dbx` behave as their base
//! types for everything this crate cares about.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::base64_payload;
use crate::ProtocolError;

/// Behavior class of a notefile, taken from its name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotefileType {
    /// Device-to-hub queue (`.qo`, `.qos`).
    OutboundQueue,
    /// Hub-to-device queue (`.qi`, `.qis`).
    InboundQueue,
    /// Bidirectionally synced database (`.db`, `.dbx`).
    Database,
}

/// Recognized suffixes and their behavior classes. The long variants sort
/// after the short ones but never collide: a name ending in `.qos` does not
/// end in `.qo`.
const SUFFIXES: &[(&str, NotefileType)] = &[
    (".qo", NotefileType::OutboundQueue),
    (".qos", NotefileType::OutboundQueue),
    (".qi", NotefileType::InboundQueue),
    (".qis", NotefileType::InboundQueue),
    (".db", NotefileType::Database),
    (".dbx", NotefileType::Database),
];

fn suffix_of(name: &str) -> Option<(&'static str, NotefileType)> {
    SUFFIXES
        .iter()
        .copied()
        .find(|(suffix, _)| name.ends_with(suffix))
}

impl NotefileType {
    /// Classify a notefile name by its suffix, or `None` when the suffix is
    /// not recognized.
    pub fn of(name: &str) -> Option<NotefileType> {
        suffix_of(name).map(|(_, kind)| kind)
    }

    /// True for either queue direction.
    pub fn is_queue(self) -> bool {
        matches!(
            self,
            NotefileType::OutboundQueue | NotefileType::InboundQueue
        )
    }
}

/// Validate a notefile name: non-empty, no whitespace, recognized suffix.
pub fn validate_notefile_name(name: &str) -> Result<NotefileType, ProtocolError> {
    if name.is_empty() {
        return Err(ProtocolError::BadNotefileName {
            name: name.to_string(),
            reason: "empty name",
        });
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ProtocolError::BadNotefileName {
            name: name.to_string(),
            reason: "name contains whitespace",
        });
    }
    match suffix_of(name) {
        Some((suffix, t)) if name.len() > suffix.len() => Ok(t),
        Some(_) => Err(ProtocolError::BadNotefileName {
            name: name.to_string(),
            reason: "name is only a suffix",
        }),
        None => Err(ProtocolError::BadNotefileName {
            name: name.to_string(),
            reason: "unrecognized suffix",
        }),
    }
}

/// Per-notefile summary returned by `file.changes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotefileInfo {
    /// Notes changed since the tracker last ran.
    #[serde(rename = "changes", default, skip_serializing_if = "is_zero")]
    pub changes: i64,

    /// Total notes in the notefile.
    #[serde(rename = "total", default, skip_serializing_if = "is_zero")]
    pub total: i64,
}

/// Per-note summary returned by `note.changes` and `note.get`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteInfo {
    /// Structured body, if any.
    #[serde(rename = "body", skip_serializing_if = "Option::is_none")]
    pub body: Option<Map<String, Value>>,

    /// Binary payload, base64 on the wire.
    #[serde(
        rename = "payload",
        default,
        with = "base64_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Vec<u8>>,

    /// Tombstone flag.
    #[serde(rename = "deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_classification() {
        assert_eq!(NotefileType::of("data.qo"), Some(NotefileType::OutboundQueue));
        assert_eq!(NotefileType::of("data.qos"), Some(NotefileType::OutboundQueue));
        assert_eq!(NotefileType::of("cmd.qi"), Some(NotefileType::InboundQueue));
        assert_eq!(NotefileType::of("cmd.qis"), Some(NotefileType::InboundQueue));
        assert_eq!(NotefileType::of("config.db"), Some(NotefileType::Database));
        assert_eq!(NotefileType::of("config.dbx"), Some(NotefileType::Database));
        assert_eq!(NotefileType::of("readme.txt"), None);
    }

    #[test]
    fn test_queue_predicate() {
        assert!(NotefileType::OutboundQueue.is_queue());
        assert!(NotefileType::InboundQueue.is_queue());
        assert!(!NotefileType::Database.is_queue());
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_notefile_name("sensors.qo").is_ok());
        assert!(validate_notefile_name("sensors.qos").is_ok());
        assert!(validate_notefile_name("cmd.qis").is_ok());
        assert!(validate_notefile_name("config.dbx").is_ok());
        assert!(validate_notefile_name("").is_err());
        assert!(validate_notefile_name("has space.qo").is_err());
        assert!(validate_notefile_name("noext").is_err());
        assert!(validate_notefile_name(".qo").is_err());
    }

    #[test]
    fn test_bare_suffix_names_rejected() {
        // A name that is nothing but its suffix has no stem to address,
        // for the long suffixes as well as the short ones.
        for bare in [".qo", ".qos", ".qi", ".qis", ".db", ".dbx"] {
            assert!(validate_notefile_name(bare).is_err(), "{bare} accepted");
        }
    }

    #[test]
    fn test_notefile_info_omits_zeroes() {
        let info = NotefileInfo::default();
        assert_eq!(serde_json::to_string(&info).unwrap(), "{}");
    }
}
