//! COBS framing with an optional XOR mask.
//!
//! Consistent Overhead Byte Stuffing removes every zero byte from a payload
//! so a reader can find frame boundaries by scanning for a single zero. Each
//! run of non-zero input (at most 254 bytes) is prefixed with a code byte
//! equal to the run length plus one; a code of 0xFF marks a full run with no
//! implied zero after it.
//!
//! Every emitted byte is additionally XORed with a caller-chosen mask. The
//! pre-mask stream contains no zero byte, so the masked stream never contains
//! the mask value itself; masking with a byte such as `\n` keeps the encoded
//! stream free of that value on a bus where it is meaningful in-band.

use thiserror::Error;

/// Longest run of data bytes a single code byte can describe.
const MAX_RUN: usize = 254;

/// Errors that can occur while decoding a COBS frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CobsError {
    /// A code byte announced more data bytes than remain in the input.
    #[error("truncated frame: code byte needs {needed} more bytes, {remaining} remain")]
    Truncated {
        /// Data bytes the code byte promised.
        needed: usize,
        /// Bytes actually left in the input.
        remaining: usize,
    },
}

/// Worst-case encoded length for `n` input bytes: one code byte per 254-byte
/// run plus one leading code byte.
pub fn max_encoded_len(n: usize) -> usize {
    n + 1 + n / MAX_RUN
}

/// Encode `src`, XORing every output byte with `mask`.
///
/// The output contains no byte equal to `mask` and is at most
/// [`max_encoded_len`]`(src.len())` bytes long. Empty input encodes to a
/// single code byte.
pub fn encode(src: &[u8], mask: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(max_encoded_len(src.len()));

    // Index of the pending code byte; patched when the run closes.
    let mut code_at = out.len();
    out.push(0);
    let mut code: u8 = 1;

    let mut iter = src.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == 0 {
            out[code_at] = code ^ mask;
            code_at = out.len();
            out.push(0);
            code = 1;
        } else {
            out.push(b ^ mask);
            code += 1;
            if code == 0xFF {
                out[code_at] = code ^ mask;
                code = 1;
                if iter.peek().is_some() {
                    code_at = out.len();
                    out.push(0);
                } else {
                    // A full run at end of input closes the frame with no
                    // trailing empty run.
                    return out;
                }
            }
        }
    }

    out[code_at] = code ^ mask;
    out
}

/// Decode a frame in place, XORing every input byte with `mask` first.
///
/// Decoding stops at the end of the buffer or at the first byte whose
/// unmasked value is zero (the frame delimiter). Returns the number of
/// recovered bytes, which occupy `buf[..len]`. No allocation.
pub fn decode_in_place(buf: &mut [u8], mask: u8) -> Result<usize, CobsError> {
    let mut read = 0;
    let mut write = 0;
    let mut prev_full = false;
    let mut first = true;

    while read < buf.len() {
        let code = buf[read] ^ mask;
        if code == 0 {
            break;
        }
        read += 1;

        // A zero sat between this run and the previous one unless the
        // previous run was a full 0xFF block.
        if !first && !prev_full {
            buf[write] = 0;
            write += 1;
        }
        first = false;

        let run = (code - 1) as usize;
        if read + run > buf.len() {
            return Err(CobsError::Truncated {
                needed: run,
                remaining: buf.len() - read,
            });
        }
        for _ in 0..run {
            buf[write] = buf[read] ^ mask;
            write += 1;
            read += 1;
        }
        prev_full = code == 0xFF;
    }

    Ok(write)
}

/// Allocating convenience wrapper around [`decode_in_place`].
pub fn decode(src: &[u8], mask: u8) -> Result<Vec<u8>, CobsError> {
    let mut buf = src.to_vec();
    let len = decode_in_place(&mut buf, mask)?;
    buf.truncate(len);
    Ok(buf)
}
