//! Response and callback envelope builders.

use zmesh_nwk::TxStatus;
use zmesh_wire::{Envelope, IeeeAddress, ShortAddress, WireError, Writer, CALLBACK_BIT};
use zmesh_zdo::ZdoStatus;

use crate::ids::{AF_DATA_CONFIRM, NWK_DATA_CONFIRM, SYS_RESET_IND};

/// Capability bitmap returned by the ping response, one bit per
/// implemented subsystem (SYS, MAC, NWK, AF, ZDO, SAPI).
pub const CAPABILITIES: u16 = 0x003F;

/// Firmware version bytes: transport revision, product id, major, minor,
/// maintenance.
pub const VERSION: [u8; 5] = [2, 1, 0, 1, 0];

/// Transmit confirm status: delivered.
pub const TX_SUCCESS: u8 = 0x00;
/// Transmit confirm status: gave up after the retry bound.
pub const TX_FAILED: u8 = 0x01;
/// Transmit confirm status: indirect hold expired unclaimed.
pub const TX_EXPIRED: u8 = 0x02;

/// Map a scheduler outcome to a confirm status byte.
pub fn tx_status_byte(status: TxStatus) -> u8 {
    match status {
        TxStatus::Delivered => TX_SUCCESS,
        TxStatus::RetriesExhausted => TX_FAILED,
        TxStatus::HoldExpired => TX_EXPIRED,
    }
}

/// Single-status-byte response to `request_id`.
pub fn status_response(request_id: u16, status: ZdoStatus) -> Envelope {
    Envelope::new(Envelope::to_response_id(request_id), vec![status.into()])
}

/// Ping response carrying the capability bitmap.
pub fn ping_response(request_id: u16) -> Envelope {
    Envelope::new(
        Envelope::to_response_id(request_id),
        CAPABILITIES.to_le_bytes().to_vec(),
    )
}

/// Version response.
pub fn version_response(request_id: u16) -> Envelope {
    Envelope::new(Envelope::to_response_id(request_id), VERSION.to_vec())
}

/// Find-node-cache response: status plus the resolved address pair.
pub fn find_node_cache_response(
    request_id: u16,
    status: ZdoStatus,
    nwk_addr: ShortAddress,
    ieee_addr: IeeeAddress,
) -> Result<Envelope, WireError> {
    let mut w = Writer::with_capacity(11);
    w.put_u8(status.into())?;
    w.put_short_addr(nwk_addr)?;
    w.put_ieee_addr(ieee_addr)?;
    Envelope::try_new(Envelope::to_response_id(request_id), w.into_payload())
}

/// Management cache response: status, table total, page start, entry
/// count, then one IEEE/network address pair per entry.
pub fn mgmt_cache_response(
    request_id: u16,
    total: u8,
    start_index: u8,
    entries: &[(IeeeAddress, ShortAddress)],
) -> Result<Envelope, WireError> {
    let mut w = Writer::with_capacity(4 + entries.len() * 10);
    w.put_u8(ZdoStatus::Success.into())?;
    w.put_u8(total)?;
    w.put_u8(start_index)?;
    w.put_u8(entries.len() as u8)?;
    for (ieee_addr, nwk_addr) in entries {
        w.put_ieee_addr(*ieee_addr)?;
        w.put_short_addr(*nwk_addr)?;
    }
    Envelope::try_new(Envelope::to_response_id(request_id), w.into_payload())
}

/// Fixed bytes of a read-configuration response before the value: status,
/// echoed key, value length.
pub const READ_CFG_OVERHEAD: usize = 4;

/// Read-configuration response: status, echoed key, then the value.
///
/// A value too large for the one-byte envelope length field is refused as
/// [`WireError::FrameTooLong`]; a partial or mis-lengthed frame is never
/// built.
pub fn read_configuration_response(
    request_id: u16,
    status: ZdoStatus,
    key: u16,
    value: &[u8],
) -> Result<Envelope, WireError> {
    let mut w = Writer::with_capacity(4 + value.len());
    w.put_u8(status.into())?;
    w.put_u16_le(key)?;
    w.put_u8(value.len() as u8)?;
    w.put_bytes(value)?;
    Envelope::try_new(Envelope::to_response_id(request_id), w.into_payload())
}

/// Poll-indication response: status plus the number of released frames.
pub fn poll_response(request_id: u16, released: u8) -> Envelope {
    Envelope::new(
        Envelope::to_response_id(request_id),
        vec![ZdoStatus::Success.into(), released],
    )
}

/// Network-layer transmit confirm callback.
pub fn nwk_data_confirm(status: u8, handle: u8) -> Envelope {
    Envelope::new(NWK_DATA_CONFIRM | CALLBACK_BIT, vec![status, handle])
}

/// Endpoint transmit confirm callback.
pub fn af_data_confirm(status: u8, endpoint: u8, handle: u8) -> Envelope {
    Envelope::new(AF_DATA_CONFIRM | CALLBACK_BIT, vec![status, endpoint, handle])
}

/// Reset indication callback.
pub fn reset_indication(reset_type: u8) -> Envelope {
    Envelope::new(SYS_RESET_IND | CALLBACK_BIT, vec![reset_type])
}
