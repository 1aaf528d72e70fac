//! Mesh address primitives.

use std::fmt;

/// 16-bit network (mesh) address of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortAddress(pub u16);

impl ShortAddress {
    /// Sentinel marking "no address" (e.g. a free cache slot).
    pub const INVALID: ShortAddress = ShortAddress(0xFFFE);

    /// Broadcast to all devices.
    pub const BROADCAST: ShortAddress = ShortAddress(0xFFFF);

    /// Whether this is a valid unicast address.
    pub fn is_unicast(self) -> bool {
        self != Self::INVALID && self != Self::BROADCAST
    }
}

impl fmt::Display for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl From<u16> for ShortAddress {
    fn from(addr: u16) -> Self {
        ShortAddress(addr)
    }
}

/// 64-bit IEEE (extended) address of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IeeeAddress(pub [u8; 8]);

impl IeeeAddress {
    /// All-zero address, used where no IEEE address is known.
    pub const UNKNOWN: IeeeAddress = IeeeAddress([0u8; 8]);

    /// Raw bytes, wire order (little-endian, LSB first).
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for IeeeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Conventional display is MSB first.
        for (i, b) in self.0.iter().rev().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_address_sentinels() {
        assert!(!ShortAddress::INVALID.is_unicast());
        assert!(!ShortAddress::BROADCAST.is_unicast());
        assert!(ShortAddress(0x1234).is_unicast());
    }

    #[test]
    fn test_ieee_display_msb_first() {
        let addr = IeeeAddress([0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(addr.to_string(), "08:07:06:05:04:03:02:01");
    }
}
