//! The per-module transaction context.
//!
//! A `Context` owns exactly one transport for one physical port and carries
//! the per-request policy: newline framing, reset-on-error, optional debug
//! tracing, and write segmentation for under-resourced modules. Callers
//! issue strictly serialized request/response cycles through it; a reply is
//! always observed before the next request goes out.

use std::time::Duration;

use modlink_protocol::{Request, Response};

use crate::{SerialTransport, TransportError};

/// Which physical link a context drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    /// Byte-stream UART.
    Serial,
    /// Chunked, polled I²C.
    I2c,
}

/// How request bytes are paced onto the wire.
///
/// `none` writes the whole request at once; `bulk` slows long writes down
/// for modules that cannot keep up with a sustained burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPolicy {
    /// Largest single write, 0 for unsegmented.
    pub max_len: usize,
    /// Gap inserted after each full segment.
    pub delay: Duration,
}

impl SegmentPolicy {
    /// No segmentation: normal operation.
    pub const fn none() -> Self {
        SegmentPolicy {
            max_len: 0,
            delay: Duration::ZERO,
        }
    }

    /// 1024-byte segments with 30 ms gaps, for bulk uploads.
    pub const fn bulk() -> Self {
        SegmentPolicy {
            max_len: 1024,
            delay: Duration::from_millis(30),
        }
    }

    /// Split `data` into at-most-`max_len` writes (one write when
    /// unsegmented).
    pub(crate) fn split<'a>(&self, data: &'a [u8]) -> impl Iterator<Item = &'a [u8]> {
        let step = if self.max_len == 0 {
            data.len().max(1)
        } else {
            self.max_len
        };
        data.chunks(step)
    }
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        SegmentPolicy::none()
    }
}

/// One request/response cycle over a physical link.
///
/// Implementations are not re-entrant; the owning [`Context`] serializes
/// access.
pub trait ModuleLink {
    /// Write the request bytes and read the complete reply.
    fn transact(&mut self, req: &[u8], segment: &SegmentPolicy)
        -> Result<Vec<u8>, TransportError>;

    /// Return the link to its idle state.
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Which kind of link this is.
    fn kind(&self) -> InterfaceKind;
}

/// Handle owning one transport instance plus per-request policy.
pub struct Context {
    link: Box<dyn ModuleLink>,
    port_name: String,
    debug: bool,
    segment: SegmentPolicy,
}

impl Context {
    /// Open a serial context on `port` (baud `None` = 115200). The port is
    /// reset and exclusively owned for the context's lifetime.
    pub fn serial(port: &str, baud: Option<u32>) -> Result<Self, TransportError> {
        let link = SerialTransport::open(port, baud)?;
        Ok(Context::from_link(Box::new(link), port))
    }

    /// Open an I²C context on `bus` (address `None` = 0x17).
    #[cfg(target_os = "linux")]
    pub fn i2c(bus: &str, addr: Option<u16>) -> Result<Self, TransportError> {
        let link = crate::I2cTransport::open(bus, addr)?;
        Ok(Context::from_link(Box::new(link), bus))
    }

    /// Wrap an already-open link.
    pub fn from_link(link: Box<dyn ModuleLink>, port_name: &str) -> Self {
        Context {
            link,
            port_name: port_name.to_string(),
            debug: false,
            segment: SegmentPolicy::none(),
        }
    }

    /// Which kind of link this context drives.
    pub fn interface(&self) -> InterfaceKind {
        self.link.kind()
    }

    /// The port or bus path this context was opened on.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Echo requests and responses to the log at debug level.
    pub fn set_debug(&mut self, on: bool) {
        self.debug = on;
    }

    /// Set the write pacing policy for subsequent requests.
    pub fn set_segmentation(&mut self, policy: SegmentPolicy) {
        self.segment = policy;
    }

    /// One full envelope cycle: serialize, transact, parse. A module-side
    /// error arrives in the response's `err` field, not as an `Err`.
    pub fn transaction(&mut self, req: &Request) -> Result<Response, TransportError> {
        let line = req.to_json_line()?;
        let reply = self.transact_raw(line)?;
        Ok(Response::from_json(&reply)?)
    }

    /// One raw cycle with already-serialized JSON. A trailing newline is
    /// appended if missing. On a transport error the link is reset (best
    /// effort) and the original error is returned; the caller decides
    /// whether to retry.
    pub fn transact_raw(&mut self, mut req: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        if req.last() != Some(&b'\n') {
            req.push(b'\n');
        }
        if self.debug {
            log::debug!("{} => {}", self.port_name, String::from_utf8_lossy(&req).trim_end());
        }
        match self.link.transact(&req, &self.segment) {
            Ok(reply) => {
                if self.debug {
                    log::debug!(
                        "{} <= {}",
                        self.port_name,
                        String::from_utf8_lossy(&reply).trim_end()
                    );
                }
                Ok(reply)
            }
            Err(e) => {
                // Leave the link re-openable; the original error is the one
                // the caller needs to see.
                if let Err(reset_err) = self.link.reset() {
                    log::warn!("{}: reset after error failed: {}", self.port_name, reset_err);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modlink_protocol::{REQ_CARD_STATUS, ERR_IO};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct LinkLog {
        requests: Vec<Vec<u8>>,
        resets: usize,
    }

    /// Link fake returning a canned reply (or error) per request.
    struct MockLink {
        log: Rc<RefCell<LinkLog>>,
        replies: Vec<Result<Vec<u8>, TransportError>>,
    }

    impl ModuleLink for MockLink {
        fn transact(
            &mut self,
            req: &[u8],
            _segment: &SegmentPolicy,
        ) -> Result<Vec<u8>, TransportError> {
            self.log.borrow_mut().requests.push(req.to_vec());
            self.replies.remove(0)
        }

        fn reset(&mut self) -> Result<(), TransportError> {
            self.log.borrow_mut().resets += 1;
            Ok(())
        }

        fn kind(&self) -> InterfaceKind {
            InterfaceKind::Serial
        }
    }

    fn context_with(replies: Vec<Result<Vec<u8>, TransportError>>) -> (Context, Rc<RefCell<LinkLog>>) {
        let log = Rc::new(RefCell::new(LinkLog::default()));
        let link = MockLink {
            log: Rc::clone(&log),
            replies,
        };
        (Context::from_link(Box::new(link), "mock"), log)
    }

    #[test]
    fn test_transaction_roundtrip() {
        let (mut ctx, log) = context_with(vec![Ok(
            b"{\"req\":\"card.status\",\"status\":\"{connected}\"}\n".to_vec(),
        )]);
        let rsp = ctx.transaction(&Request::new(REQ_CARD_STATUS)).unwrap();
        assert_eq!(rsp.status.as_deref(), Some("{connected}"));
        assert!(!rsp.is_error());

        // The request went out as one newline-terminated JSON line.
        let sent = &log.borrow().requests[0];
        assert_eq!(sent.as_slice(), b"{\"req\":\"card.status\"}\n");
    }

    #[test]
    fn test_module_error_is_a_response() {
        let (mut ctx, _) = context_with(vec![Ok(
            b"{\"err\":\"can't reach service {io}\"}\n".to_vec(),
        )]);
        let rsp = ctx.transaction(&Request::new(REQ_CARD_STATUS)).unwrap();
        assert!(rsp.is_error());
        assert!(rsp.has_error_token(ERR_IO));
    }

    #[test]
    fn test_newline_appended_once() {
        let (mut ctx, log) = context_with(vec![Ok(b"{}\n".to_vec()), Ok(b"{}\n".to_vec())]);
        ctx.transact_raw(b"{}".to_vec()).unwrap();
        ctx.transact_raw(b"{}\n".to_vec()).unwrap();
        let log = log.borrow();
        assert_eq!(log.requests[0], b"{}\n");
        assert_eq!(log.requests[1], b"{}\n");
    }

    #[test]
    fn test_transport_error_resets_and_surfaces() {
        let (mut ctx, log) = context_with(vec![Err(TransportError::HardwareEof)]);
        let err = ctx.transact_raw(b"{}".to_vec()).unwrap_err();
        assert!(matches!(err, TransportError::HardwareEof));
        assert_eq!(log.borrow().resets, 1);
    }

    #[test]
    fn test_garbled_reply_is_protocol_error() {
        let (mut ctx, _) = context_with(vec![Ok(b"not json\n".to_vec())]);
        let err = ctx.transaction(&Request::new(REQ_CARD_STATUS)).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }
}
