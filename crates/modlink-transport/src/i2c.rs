//! I²C transport.
//!
//! The module is a 7-bit slave with no memory map; every master-to-slave
//! transfer is interpreted by its first byte:
//!
//! - `1..=127` — a data chunk of that many request bytes follows.
//! - `0x80` — probe: the next one-byte read returns how many reply bytes
//!   are queued.
//! - `0x80 + n` — pull: the next `n`-byte read returns the next `n` reply
//!   bytes.
//!
//! A probe answering zero means "not ready yet" while nothing has been
//! received, and "end of reply" afterwards. Polls run on a 100 ms cadence.

use std::io;
use std::thread;
use std::time::Duration;

use crate::{InterfaceKind, ModuleLink, SegmentPolicy, TransportError};

/// Default 7-bit slave address of the module.
pub const DEFAULT_I2C_ADDR: u16 = 0x17;

/// Largest chunk either direction may carry.
pub const I2C_MAX_CHUNK: usize = 127;

/// First byte of a probe or pull transfer.
const REG_REPLY: u8 = 0x80;

/// Reply polling cadence.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reset attempts before the bus is declared unresettable.
const RESET_ATTEMPTS: u32 = 5;

/// Probe polls a bounded exchange tolerates before giving up.
const RESET_MAX_POLLS: u32 = 10;

/// Raw access to the bus, one transfer at a time. The Linux implementation
/// wraps an `i2cdev` device; tests use a scripted fake.
pub trait I2cBus {
    /// One master-write transfer.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// One master-read transfer filling `buf` exactly.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

/// An I²C link to the module.
pub struct I2cTransport<B> {
    bus: B,
    /// A protocol error occurred; reset before the next transaction.
    needs_reset: bool,
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use i2cdev::core::I2CDevice;
    use i2cdev::linux::LinuxI2CDevice;

    /// An `i2cdev` bus device bound to one slave address.
    pub struct LinuxI2cBus {
        device: LinuxI2CDevice,
    }

    impl I2cBus for LinuxI2cBus {
        fn write(&mut self, data: &[u8]) -> io::Result<()> {
            self.device
                .write(data)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
            self.device
                .read(buf)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        }
    }

    impl I2cTransport<LinuxI2cBus> {
        /// Open and reset the bus at `path` (for example `/dev/i2c-1`),
        /// talking to `addr` or the default module address.
        pub fn open(path: &str, addr: Option<u16>) -> Result<Self, TransportError> {
            let device = LinuxI2CDevice::new(path, addr.unwrap_or(DEFAULT_I2C_ADDR))
                .map_err(|e| TransportError::Open {
                    port: path.to_string(),
                    reason: e.to_string(),
                })?;
            let mut transport = I2cTransport::from_bus(LinuxI2cBus { device });
            transport.reset()?;
            Ok(transport)
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux::LinuxI2cBus;

impl<B: I2cBus> I2cTransport<B> {
    /// Wrap an already-open bus. No reset is performed.
    pub fn from_bus(bus: B) -> Self {
        I2cTransport {
            bus,
            needs_reset: false,
        }
    }

    /// Bring the bus to a known idle state: an empty `"\n"` request must
    /// come back as exactly `"\r\n"`.
    pub fn reset(&mut self) -> Result<(), TransportError> {
        for attempt in 0..RESET_ATTEMPTS {
            match self.exchange(b"\n", &SegmentPolicy::none(), Some(RESET_MAX_POLLS)) {
                Ok(reply) if reply == b"\r\n" => {
                    log::debug!("i2c bus idle after {} reset attempt(s)", attempt + 1);
                    self.needs_reset = false;
                    return Ok(());
                }
                Ok(_) | Err(_) => continue,
            }
        }
        Err(TransportError::ResetFailed)
    }

    /// Ask the module how many reply bytes are queued.
    fn probe(&mut self) -> Result<u8, TransportError> {
        self.bus.write(&[REG_REPLY])?;
        let mut count = [0u8; 1];
        self.bus.read(&mut count)?;
        Ok(count[0])
    }

    fn exchange(
        &mut self,
        req: &[u8],
        segment: &SegmentPolicy,
        max_polls: Option<u32>,
    ) -> Result<Vec<u8>, TransportError> {
        // Request goes out in length-prefixed chunks. A zero-length request
        // sends nothing and proceeds straight to polling. The 127-byte wire
        // chunk is already the segment here, so only the policy's delay
        // applies; `max_len` is a serial concern.
        let mut msg = Vec::with_capacity(I2C_MAX_CHUNK + 1);
        for chunk in req.chunks(I2C_MAX_CHUNK) {
            msg.clear();
            msg.push(chunk.len() as u8);
            msg.extend_from_slice(chunk);
            self.bus.write(&msg)?;
            if !segment.delay.is_zero() {
                thread::sleep(segment.delay);
            }
        }

        let mut reply = Vec::new();
        let mut polls = 0u32;
        loop {
            let queued = self.probe()?;
            if queued == 0 {
                if !reply.is_empty() {
                    // End of reply.
                    break;
                }
                // Not ready yet.
                if let Some(limit) = max_polls {
                    polls += 1;
                    if polls >= limit {
                        return Err(TransportError::ReplyTimeout { polls });
                    }
                }
                thread::sleep(POLL_INTERVAL);
                continue;
            }

            let take = (queued as usize).min(I2C_MAX_CHUNK);
            self.bus.write(&[REG_REPLY + take as u8])?;
            let mut buf = vec![0u8; take];
            self.bus.read(&mut buf)?;
            reply.extend_from_slice(&buf);
            log::trace!("i2c pulled {} reply byte(s)", take);
        }
        Ok(reply)
    }
}

impl<B: I2cBus> ModuleLink for I2cTransport<B> {
    fn transact(&mut self, req: &[u8], segment: &SegmentPolicy) -> Result<Vec<u8>, TransportError> {
        if self.needs_reset {
            self.reset()?;
        }
        match self.exchange(req, segment, None) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.needs_reset = true;
                Err(e)
            }
        }
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        I2cTransport::reset(self)
    }

    fn kind(&self) -> InterfaceKind {
        InterfaceKind::I2c
    }
}
