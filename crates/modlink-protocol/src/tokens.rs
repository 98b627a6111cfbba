//! Machine-readable error tokens.
//!
//! The `err` field of a response is free text with any number of embedded
//! brace-delimited tokens. Callers match tokens to choose a recovery policy
//! (retry on `{io}` or `{network}`, wait on `{dfu-not-ready}`, abort on
//! `{access-denied}`) and strip them before showing the text to a person.

// ============================================================================
// Canonical token set
// ============================================================================

/// The request timed out.
pub const ERR_TIMEOUT: &str = "{timeout}";
/// The connection or device was closed.
pub const ERR_CLOSED: &str = "{closed}";
/// A local I/O failure.
pub const ERR_IO: &str = "{io}";
/// The module is connected.
pub const ERR_CONNECTED: &str = "{connected}";
/// The module is disconnected.
pub const ERR_DISCONNECTED: &str = "{disconnected}";
/// A connection attempt is in progress.
pub const ERR_CONNECTING: &str = "{connecting}";
/// A connection attempt failed.
pub const ERR_CONNECT_FAILURE: &str = "{connect-failure}";
/// Waiting for cellular service.
pub const ERR_WAIT_SERVICE: &str = "{wait-service}";
/// Waiting for a data session.
pub const ERR_WAIT_DATA: &str = "{wait-data}";
/// Waiting for the gateway.
pub const ERR_WAIT_GATEWAY: &str = "{wait-gateway}";
/// Waiting for the module.
pub const ERR_WAIT_MODULE: &str = "{wait-module}";
/// A network-level failure.
pub const ERR_NETWORK: &str = "{network}";
/// Firmware update is staged but the module is not ready for it.
pub const ERR_DFU_NOT_READY: &str = "{dfu-not-ready}";
/// Authentication failure.
pub const ERR_AUTH: &str = "{auth}";
/// Session ticket failure.
pub const ERR_TICKET: &str = "{ticket}";
/// No handler is registered for the request.
pub const ERR_NO_HANDLER: &str = "{no-handler}";
/// The module is idle.
pub const ERR_IDLE: &str = "{idle}";
/// The device does not exist.
pub const ERR_DEVICE_NOEXIST: &str = "{device-noexist}";
/// No device was specified.
pub const ERR_DEVICE_NONE: &str = "{device-none}";
/// The device is disabled.
pub const ERR_DEVICE_DISABLED: &str = "{device-disabled}";
/// The product does not exist.
pub const ERR_PRODUCT_NOEXIST: &str = "{product-noexist}";
/// No product was specified.
pub const ERR_PRODUCT_NONE: &str = "{product-none}";
/// The app does not exist.
pub const ERR_APP_NOEXIST: &str = "{app-noexist}";
/// No app was specified.
pub const ERR_APP_NONE: &str = "{app-none}";
/// The app has been deleted.
pub const ERR_APP_DELETED: &str = "{app-deleted}";
/// The app already exists.
pub const ERR_APP_EXISTS: &str = "{app-exists}";
/// The fleet does not exist.
pub const ERR_FLEET_NOEXIST: &str = "{fleet-noexist}";
/// The caller is not permitted to do this.
pub const ERR_ACCESS_DENIED: &str = "{access-denied}";
/// The event must not be routed.
pub const ERR_DO_NOT_ROUTE: &str = "{do-not-route}";
/// A web payload failure.
pub const ERR_WEB_PAYLOAD: &str = "{web-payload}";
/// The hub is in the wrong mode for this request.
pub const ERR_HUB_MODE: &str = "{hub-mode}";
/// The note is incompatible with the notefile template.
pub const ERR_TEMPLATE_INCOMPATIBLE: &str = "{template-incompatible}";
/// A request syntax error.
pub const ERR_SYNTAX: &str = "{syntax}";
/// An incompatibility was detected.
pub const ERR_INCOMPATIBLE: &str = "{incompatible}";
/// The request or payload is too large.
pub const ERR_TOO_BIG: &str = "{too-big}";
/// The supplied body is not valid JSON.
pub const ERR_NOT_JSON: &str = "{not-json}";
/// GPS is not active.
pub const ERR_GPS_INACTIVE: &str = "{gps-inactive}";
/// The notefile name is invalid.
pub const ERR_NOTEFILE_BAD_NAME: &str = "{notefile-bad-name}";
/// The notefile is in use.
pub const ERR_NOTEFILE_IN_USE: &str = "{notefile-in-use}";
/// The notefile already exists.
pub const ERR_NOTEFILE_EXISTS: &str = "{notefile-exists}";
/// The notefile does not exist.
pub const ERR_NOTEFILE_NOEXIST: &str = "{notefile-noexist}";
/// The operation is not allowed on a queue notefile.
pub const ERR_NOTEFILE_QUEUE_DISALLOWED: &str = "{notefile-queue-disallowed}";
/// The note does not exist.
pub const ERR_NOTE_NOEXIST: &str = "{note-noexist}";
/// The note already exists.
pub const ERR_NOTE_EXISTS: &str = "{note-exists}";
/// The file does not exist.
pub const ERR_FILE_NOEXIST: &str = "{file-noexist}";
/// The tracker does not exist.
pub const ERR_TRACKER_NOEXIST: &str = "{tracker-noexist}";
/// The tracker already exists.
pub const ERR_TRACKER_EXISTS: &str = "{tracker-exists}";

// ============================================================================
// Predicates
// ============================================================================

/// True if `err` contains the given `{token}`.
pub fn error_contains(err: &str, token: &str) -> bool {
    !err.is_empty() && err.contains(token)
}

/// Remove every `{…}` token from `err` and collapse the whitespace left
/// behind, yielding the human-readable remainder.
pub fn error_clean(err: &str) -> String {
    let mut out = String::with_capacity(err.len());
    let mut chars = err.chars();
    while let Some(c) = chars.next() {
        if c == '{' {
            // Skip through the closing brace; an unterminated token runs to
            // the end of the string.
            for t in chars.by_ref() {
                if t == '}' {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }

    // Collapse runs of spaces introduced by removed tokens.
    let mut cleaned = String::with_capacity(out.len());
    let mut prev_space = false;
    for c in out.chars() {
        if c == ' ' {
            if !prev_space {
                cleaned.push(c);
            }
            prev_space = true;
        } else {
            cleaned.push(c);
            prev_space = false;
        }
    }
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_token() {
        let err = "can't reach service {io} {network}";
        assert!(error_contains(err, ERR_IO));
        assert!(error_contains(err, ERR_NETWORK));
        assert!(!error_contains(err, ERR_TIMEOUT));
        assert!(!error_contains("", ERR_IO));
    }

    #[test]
    fn test_clean_strips_tokens() {
        assert_eq!(
            error_clean("can't reach service {io} {network}"),
            "can't reach service"
        );
    }

    #[test]
    fn test_clean_interior_token() {
        assert_eq!(
            error_clean("note {note-noexist} not found in file"),
            "note not found in file"
        );
    }

    #[test]
    fn test_clean_no_tokens() {
        assert_eq!(error_clean("plain message"), "plain message");
    }

    #[test]
    fn test_clean_unterminated_token() {
        assert_eq!(error_clean("broken {io"), "broken");
    }
}
