//! Command envelope framing.
//!
//! Each serial message is framed as:
//!
//! ```text
//! +------+--------+--------+-----+-----------------+-----+
//! | SOP  | cmd_hi | cmd_lo | len | payload[0..len] | fcs |
//! +------+--------+--------+-----+-----------------+-----+
//! ```
//!
//! `fcs` is the XOR of every byte from `cmd_hi` through the last payload
//! byte (SOP and the checksum itself excluded). The command id is carried
//! big-endian; everything inside payloads is little-endian (see the cursor
//! module).

use bytes::{Buf, BytesMut};

use crate::WireError;

/// Start-of-packet marker byte.
pub const SOP: u8 = 0xFE;

/// Maximum payload length (one-byte length field).
pub const MAX_PAYLOAD: usize = 255;

/// Envelope overhead: SOP + command id (2) + length + checksum.
pub const ENVELOPE_OVERHEAD: usize = 5;

/// Set on a command id to mark a response to a request.
pub const RESPONSE_BIT: u16 = 0x1000;

/// Set on a command id to mark an unsolicited callback/event.
pub const CALLBACK_BIT: u16 = 0x2000;

/// Set on a command id to mark debug-trace traffic.
pub const DEBUG_TRACE_BIT: u16 = 0x4000;

/// XOR checksum over the command id, length, and payload bytes.
pub fn checksum(command_id: u16, payload: &[u8]) -> u8 {
    let [hi, lo] = command_id.to_be_bytes();
    let mut fcs = hi ^ lo ^ (payload.len() as u8);
    for b in payload {
        fcs ^= b;
    }
    fcs
}

/// A decoded wire envelope: command id plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// 16-bit command id (request, response, or callback space).
    pub command_id: u16,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Create an envelope from a command id and payload.
    pub fn new(command_id: u16, payload: Vec<u8>) -> Self {
        Envelope {
            command_id,
            payload,
        }
    }

    /// Whether this id is in the response space.
    pub fn is_response(&self) -> bool {
        self.command_id & RESPONSE_BIT != 0
    }

    /// Whether this id is in the callback space.
    pub fn is_callback(&self) -> bool {
        self.command_id & CALLBACK_BIT != 0
    }

    /// The response id for this request id.
    pub fn to_response_id(command_id: u16) -> u16 {
        command_id | RESPONSE_BIT
    }

    /// Encode to wire bytes (SOP + header + payload + checksum).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENVELOPE_OVERHEAD + self.payload.len());
        buf.push(SOP);
        buf.extend_from_slice(&self.command_id.to_be_bytes());
        buf.push(self.payload.len() as u8);
        buf.extend_from_slice(&self.payload);
        buf.push(checksum(self.command_id, &self.payload));
        buf
    }

    /// Decode an envelope from wire bytes.
    ///
    /// The input must be exactly one frame starting at the SOP marker.
    /// A checksum mismatch is reported as [`WireError::ChecksumMismatch`];
    /// the caller decides drop policy.
    pub fn decode(data: &[u8]) -> Result<Envelope, WireError> {
        if data.len() < ENVELOPE_OVERHEAD {
            return Err(WireError::FrameTooShort {
                expected: ENVELOPE_OVERHEAD,
                actual: data.len(),
            });
        }
        if data[0] != SOP {
            return Err(WireError::MissingSop(data[0]));
        }

        let command_id = u16::from_be_bytes([data[1], data[2]]);
        let len = data[3] as usize;
        if data.len() < ENVELOPE_OVERHEAD + len {
            return Err(WireError::FrameTooShort {
                expected: ENVELOPE_OVERHEAD + len,
                actual: data.len(),
            });
        }

        let payload = data[4..4 + len].to_vec();
        let expected = checksum(command_id, &payload);
        let actual = data[4 + len];
        if expected != actual {
            return Err(WireError::ChecksumMismatch { expected, actual });
        }

        Ok(Envelope {
            command_id,
            payload,
        })
    }

    /// Build an envelope from a command id and payload, validating length.
    pub fn try_new(command_id: u16, payload: Vec<u8>) -> Result<Envelope, WireError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(WireError::FrameTooLong {
                max: MAX_PAYLOAD,
                actual: payload.len(),
            });
        }
        Ok(Envelope {
            command_id,
            payload,
        })
    }
}

/// Receive-side accumulator that extracts complete frames from a byte
/// stream.
///
/// Bytes arrive from the transport in arbitrary chunks (the ISR path only
/// accumulates); `next_frame` scans for the SOP marker, discards preceding
/// garbage, and yields one complete raw frame at a time. Checksum
/// validation happens in [`Envelope::decode`], not here.
#[derive(Debug, Default)]
pub struct EnvelopeCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl EnvelopeCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        EnvelopeCodec {
            buffer: BytesMut::with_capacity(MAX_PAYLOAD + ENVELOPE_OVERHEAD),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete raw frame from the buffer.
    ///
    /// Returns `Some(frame_bytes)` (SOP through checksum inclusive) if a
    /// complete frame is available, or `None` if more data is needed.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        // Scan for the SOP marker, discarding any preceding garbage.
        while !self.buffer.is_empty() && self.buffer[0] != SOP {
            self.buffer.advance(1);
        }

        // Need at least SOP + command id + length to know the frame size.
        if self.buffer.len() < 4 {
            return None;
        }

        let len = self.buffer[3] as usize;
        let total = ENVELOPE_OVERHEAD + len;
        if self.buffer.len() < total {
            return None;
        }

        Some(self.buffer.split_to(total).to_vec())
    }

    /// Number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
