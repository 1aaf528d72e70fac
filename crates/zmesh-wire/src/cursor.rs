//! Bounded byte cursor for building and parsing payloads.
//!
//! Multi-byte payload fields are little-endian on the wire; the envelope
//! command id is the one big-endian exception and is handled by the envelope
//! codec itself. All field packing in the stack goes through [`Writer`] and
//! [`Reader`] so that length accounting lives in exactly one place.

use crate::{IeeeAddress, ShortAddress, WireError};

/// A position-tracking payload builder with a hard capacity.
///
/// Writes past the capacity return [`WireError::Overflow`] rather than
/// silently truncating or growing.
#[derive(Debug)]
pub struct Writer {
    buf: Vec<u8>,
    capacity: usize,
}

impl Writer {
    /// Create a writer bounded to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Remaining capacity in bytes.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    fn check(&self, additional: usize) -> Result<(), WireError> {
        let reach = self.buf.len() + additional;
        if reach > self.capacity {
            return Err(WireError::Overflow {
                capacity: self.capacity,
                reach,
            });
        }
        Ok(())
    }

    /// Append a single byte.
    pub fn put_u8(&mut self, v: u8) -> Result<(), WireError> {
        self.check(1)?;
        self.buf.push(v);
        Ok(())
    }

    /// Append a 16-bit value, little-endian.
    pub fn put_u16_le(&mut self, v: u16) -> Result<(), WireError> {
        self.check(2)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Append a 16-bit value, big-endian.
    pub fn put_u16_be(&mut self, v: u16) -> Result<(), WireError> {
        self.check(2)?;
        self.buf.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    /// Append a 32-bit value, little-endian.
    pub fn put_u32_le(&mut self, v: u32) -> Result<(), WireError> {
        self.check(4)?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Append a raw byte slice.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        self.check(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a short address (little-endian).
    pub fn put_short_addr(&mut self, addr: ShortAddress) -> Result<(), WireError> {
        self.put_u16_le(addr.0)
    }

    /// Append an IEEE address (wire order).
    pub fn put_ieee_addr(&mut self, addr: IeeeAddress) -> Result<(), WireError> {
        self.put_bytes(&addr.0)
    }

    /// Consume the writer, yielding the built payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.buf
    }
}

/// A position-tracking payload parser.
///
/// Reads past the end of the input return [`WireError::UnexpectedEnd`].
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEnd {
                offset: self.pos,
                need: n - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a single byte.
    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    /// Read a 16-bit value, little-endian.
    pub fn get_u16_le(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a 16-bit value, big-endian.
    pub fn get_u16_be(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a 32-bit value, little-endian.
    pub fn get_u32_le(&mut self) -> Result<u32, WireError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read `n` raw bytes.
    pub fn get_bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        self.take(n)
    }

    /// Read everything left in the buffer.
    pub fn get_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Read a short address (little-endian).
    pub fn get_short_addr(&mut self) -> Result<ShortAddress, WireError> {
        Ok(ShortAddress(self.get_u16_le()?))
    }

    /// Read an IEEE address (wire order).
    pub fn get_ieee_addr(&mut self) -> Result<IeeeAddress, WireError> {
        let b = self.take(8)?;
        let mut addr = [0u8; 8];
        addr.copy_from_slice(b);
        Ok(IeeeAddress(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reader_roundtrip() {
        let mut w = Writer::with_capacity(32);
        w.put_u8(0xAB).unwrap();
        w.put_u16_le(0x1234).unwrap();
        w.put_u32_le(0xDEADBEEF).unwrap();
        w.put_short_addr(ShortAddress(0x4567)).unwrap();
        w.put_ieee_addr(IeeeAddress([1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
        let payload = w.into_payload();

        let mut r = Reader::new(&payload);
        assert_eq!(r.get_u8().unwrap(), 0xAB);
        assert_eq!(r.get_u16_le().unwrap(), 0x1234);
        assert_eq!(r.get_u32_le().unwrap(), 0xDEADBEEF);
        assert_eq!(r.get_short_addr().unwrap(), ShortAddress(0x4567));
        assert_eq!(
            r.get_ieee_addr().unwrap(),
            IeeeAddress([1, 2, 3, 4, 5, 6, 7, 8])
        );
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_writer_overflow() {
        let mut w = Writer::with_capacity(3);
        w.put_u16_le(1).unwrap();
        let err = w.put_u16_le(2).unwrap_err();
        assert_eq!(
            err,
            WireError::Overflow {
                capacity: 3,
                reach: 4
            }
        );
        // A failed write leaves the buffer untouched.
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn test_reader_underrun() {
        let mut r = Reader::new(&[0x01]);
        let err = r.get_u16_le().unwrap_err();
        assert_eq!(err, WireError::UnexpectedEnd { offset: 0, need: 1 });
    }

    #[test]
    fn test_u16_endianness() {
        let mut w = Writer::with_capacity(4);
        w.put_u16_le(0x1234).unwrap();
        w.put_u16_be(0x1234).unwrap();
        assert_eq!(w.into_payload(), vec![0x34, 0x12, 0x12, 0x34]);
    }
}
