//! Command identifier space.
//!
//! Bits 8..11 of a command id select the subsystem; the low byte selects
//! the command within it. Bits 12..14 are the direction bits defined in
//! `zmesh-wire` (response, callback, debug trace) and are never part of a
//! request id.

/// Subsystem nibble carried in bits 8..11 of a command id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    /// System management.
    Sys,
    /// MAC layer passthrough.
    Mac,
    /// Network layer data service.
    Nwk,
    /// Application framework (endpoints).
    Af,
    /// Device objects (discovery cache).
    Zdo,
    /// Simple API (configuration and basic transmit).
    Sapi,
}

impl Subsystem {
    /// Resolve the subsystem of a request id, if it is a known one.
    pub fn of(command_id: u16) -> Option<Subsystem> {
        match (command_id >> 8) & 0x0F {
            0x0 => Some(Subsystem::Sys),
            0x1 => Some(Subsystem::Mac),
            0x2 => Some(Subsystem::Nwk),
            0x3 => Some(Subsystem::Af),
            0x4 => Some(Subsystem::Zdo),
            0x5 => Some(Subsystem::Sapi),
            _ => None,
        }
    }
}

/// Soft reset request.
pub const SYS_RESET_REQ: u16 = 0x0000;
/// Liveness check; answered with the capability bitmap.
pub const SYS_PING: u16 = 0x0007;
/// Firmware version query.
pub const SYS_VERSION: u16 = 0x0008;
/// Reset indication callback base id.
pub const SYS_RESET_IND: u16 = 0x0080;

/// (Re)initialize the MAC layer.
pub const MAC_INIT: u16 = 0x0102;
/// Direct MAC transmit, bypassing the network scheduler.
pub const MAC_DATA_REQ: u16 = 0x0105;

/// (Re)initialize the network layer; empties the frame pool.
pub const NWK_INIT: u16 = 0x0200;
/// Enqueue an outbound network frame.
pub const NWK_DATA_REQ: u16 = 0x0201;
/// A sleeping destination polled; release its held frames.
pub const NWK_POLL_IND: u16 = 0x0202;
/// Transmit confirmation callback base id.
pub const NWK_DATA_CONFIRM: u16 = 0x0280;

/// Register a local endpoint with its simple descriptor.
pub const AF_REGISTER: u16 = 0x0300;
/// Enqueue an outbound frame on a registered endpoint.
pub const AF_DATA_REQ: u16 = 0x0301;
/// Endpoint transmit confirmation callback base id.
pub const AF_DATA_CONFIRM: u16 = 0x0380;

/// Reserve a discovery-cache slot.
pub const ZDO_DISCOVERY_STORE: u16 = 0x0401;
/// Store a node descriptor in the cache.
pub const ZDO_NODE_DESC_STORE: u16 = 0x0402;
/// Store a power descriptor in the cache.
pub const ZDO_POWER_DESC_STORE: u16 = 0x0403;
/// Store an active endpoint list in the cache.
pub const ZDO_ACTIVE_EP_STORE: u16 = 0x0404;
/// Store a simple descriptor in the cache.
pub const ZDO_SIMPLE_DESC_STORE: u16 = 0x0405;
/// Look up a cached device.
pub const ZDO_FIND_NODE_CACHE: u16 = 0x0406;
/// Paginated cache table read-out.
pub const ZDO_MGMT_CACHE: u16 = 0x0407;
/// Evict a cached device.
pub const ZDO_REMOVE_NODE_CACHE: u16 = 0x0408;

/// Read a configuration item from persistent storage.
pub const SAPI_READ_CFG: u16 = 0x0501;
/// Write a configuration item to persistent storage.
pub const SAPI_WRITE_CFG: u16 = 0x0502;
/// Simple-API transmit with default options.
pub const SAPI_SEND_DATA: u16 = 0x0503;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_of() {
        assert_eq!(Subsystem::of(SYS_PING), Some(Subsystem::Sys));
        assert_eq!(Subsystem::of(MAC_DATA_REQ), Some(Subsystem::Mac));
        assert_eq!(Subsystem::of(NWK_DATA_REQ), Some(Subsystem::Nwk));
        assert_eq!(Subsystem::of(AF_REGISTER), Some(Subsystem::Af));
        assert_eq!(Subsystem::of(ZDO_MGMT_CACHE), Some(Subsystem::Zdo));
        assert_eq!(Subsystem::of(SAPI_SEND_DATA), Some(Subsystem::Sapi));
        assert_eq!(Subsystem::of(0x0F00), None);
    }
}
