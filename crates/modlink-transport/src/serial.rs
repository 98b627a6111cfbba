//! Serial (UART) transport.
//!
//! Requests and replies are newline-terminated JSON lines on a plain byte
//! stream, 8-N-1 at 115200 baud by default. The transport works over any
//! `Read + Write` stream; [`SerialTransport::open`] binds it to a real
//! port. Resetting writes `"\n\n"` and drains until the module emits
//! nothing but CR/LF, which discards any in-progress command on the module
//! side.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use serialport::{DataBits, Parity, StopBits};

use crate::{InterfaceKind, ModuleLink, SegmentPolicy, TransportError};

/// Default UART bit rate.
pub const DEFAULT_SERIAL_BAUD: u32 = 115_200;

/// Default per-read timeout on the port.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// How long the module gets to flush noise after a reset poke.
const RESET_SETTLE: Duration = Duration::from_millis(500);

/// Reset pokes before the port is declared unresettable.
const RESET_ATTEMPTS: u32 = 10;

/// A serial link to the module over any byte stream.
pub struct SerialTransport<S> {
    stream: S,
    /// A protocol error occurred; reset before the next transaction.
    needs_reset: bool,
    /// Settle time between the reset poke and the drain.
    settle: Duration,
    rx: BytesMut,
}

impl SerialTransport<Box<dyn serialport::SerialPort>> {
    /// Open and reset a UART at `port`. `baud` defaults to
    /// [`DEFAULT_SERIAL_BAUD`]. The port is exclusively owned until drop;
    /// opening it twice is an error at the OS level.
    pub fn open(port: &str, baud: Option<u32>) -> Result<Self, TransportError> {
        let stream = serialport::new(port, baud.unwrap_or(DEFAULT_SERIAL_BAUD))
            .timeout(DEFAULT_READ_TIMEOUT)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open()
            .map_err(|e| TransportError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        let mut transport = SerialTransport::from_stream(stream);
        transport.reset()?;
        Ok(transport)
    }
}

impl<S: Read + Write> SerialTransport<S> {
    /// Wrap an already-open byte stream. No reset is performed.
    pub fn from_stream(stream: S) -> Self {
        SerialTransport {
            stream,
            needs_reset: false,
            settle: RESET_SETTLE,
            rx: BytesMut::with_capacity(1024),
        }
    }

    #[cfg(test)]
    fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Return the port to its idle state: poke with `"\n\n"`, then drain
    /// until a pass produces nothing but CR/LF.
    pub fn reset(&mut self) -> Result<(), TransportError> {
        self.rx.clear();
        for attempt in 0..RESET_ATTEMPTS {
            self.stream.write_all(b"\n\n")?;
            self.stream.flush()?;
            thread::sleep(self.settle);

            let mut noise = false;
            let mut buf = [0u8; 256];
            loop {
                let started = Instant::now();
                match self.stream.read(&mut buf) {
                    Ok(0) => {
                        // EOF with no elapsed wait means the device is gone,
                        // not merely quiet.
                        if started.elapsed() < Duration::from_millis(2) {
                            return Err(TransportError::HardwareEof);
                        }
                        break;
                    }
                    Ok(n) => {
                        if buf[..n].iter().any(|&b| b != b'\r' && b != b'\n') {
                            noise = true;
                        }
                    }
                    Err(e) if is_read_timeout(&e) => break,
                    Err(e) => return Err(e.into()),
                }
            }

            if !noise {
                log::debug!("serial port idle after {} reset poke(s)", attempt + 1);
                self.needs_reset = false;
                return Ok(());
            }
        }
        Err(TransportError::ResetFailed)
    }

    fn exchange(&mut self, req: &[u8], segment: &SegmentPolicy) -> Result<Vec<u8>, TransportError> {
        for chunk in segment.split(req) {
            self.stream.write_all(chunk)?;
            self.stream.flush()?;
            if !segment.delay.is_zero() && chunk.len() == segment.max_len {
                thread::sleep(segment.delay);
            }
        }

        // Accumulate until the reply ends in a newline. Read timeouts are
        // silently retried; the caller imposes any outer deadline.
        self.rx.clear();
        let mut buf = [0u8; 512];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Err(TransportError::HardwareEof),
                Ok(n) => {
                    self.rx.extend_from_slice(&buf[..n]);
                    if self.rx.last() == Some(&b'\n') {
                        return Ok(self.rx.split().to_vec());
                    }
                }
                Err(e) if is_read_timeout(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<S: Read + Write> ModuleLink for SerialTransport<S> {
    fn transact(&mut self, req: &[u8], segment: &SegmentPolicy) -> Result<Vec<u8>, TransportError> {
        if self.needs_reset {
            self.reset()?;
        }
        match self.exchange(req, segment) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.needs_reset = true;
                Err(e)
            }
        }
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        SerialTransport::reset(self)
    }

    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Serial
    }
}

fn is_read_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
