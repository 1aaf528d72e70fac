//! Typed request commands decoded from inbound envelopes.
//!
//! Multi-byte payload fields are little-endian. Variable-length data is
//! length-prefixed with a single byte.

use zmesh_nwk::TxOptions;
use zmesh_wire::{Envelope, IeeeAddress, Reader, ShortAddress, CALLBACK_BIT, RESPONSE_BIT};
use zmesh_zdo::{DiscoveryStoreReq, NodeDescriptor, PowerDescriptor, SimpleDescriptor};

use crate::error::MtError;
use crate::ids::*;

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MtCommand {
    /// Soft reset of the whole stack.
    SysReset {
        /// 0 = soft, 1 = hard. Both behave the same here.
        reset_type: u8,
    },

    /// Liveness check.
    SysPing,

    /// Firmware version query.
    SysVersion,

    /// (Re)initialize the MAC layer.
    MacInit,

    /// Direct MAC transmit, bypassing the network frame pool.
    MacDataReq {
        /// Destination short address.
        destination: ShortAddress,
        /// Caller correlation handle.
        handle: u8,
        /// Transmit options.
        options: TxOptions,
        /// Frame payload.
        data: Vec<u8>,
    },

    /// (Re)initialize the network layer.
    NwkInit,

    /// Enqueue an outbound network frame.
    NwkDataReq {
        /// Destination short address.
        destination: ShortAddress,
        /// Caller correlation handle.
        handle: u8,
        /// Transmit options.
        options: TxOptions,
        /// Route radius in hops (informational).
        radius: u8,
        /// Frame payload.
        data: Vec<u8>,
    },

    /// A sleeping destination polled for its pending traffic.
    NwkPollInd {
        /// The destination that is now reachable.
        destination: ShortAddress,
    },

    /// Register a local endpoint.
    AfRegister {
        /// The endpoint's simple descriptor.
        desc: SimpleDescriptor,
    },

    /// Enqueue an outbound frame on a registered endpoint.
    AfDataReq {
        /// Destination short address.
        destination: ShortAddress,
        /// Destination endpoint.
        dst_endpoint: u8,
        /// Local source endpoint; must be registered.
        src_endpoint: u8,
        /// Application cluster id.
        cluster: u16,
        /// Caller correlation handle.
        handle: u8,
        /// Transmit options.
        options: TxOptions,
        /// Frame payload.
        data: Vec<u8>,
    },

    /// Reserve a discovery-cache slot.
    ZdoDiscoveryStore {
        /// Reservation parameters.
        req: DiscoveryStoreReq,
    },

    /// Store a node descriptor.
    ZdoNodeDescStore {
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
        /// Descriptor to store.
        desc: NodeDescriptor,
    },

    /// Store a power descriptor.
    ZdoPowerDescStore {
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
        /// Descriptor to store.
        desc: PowerDescriptor,
    },

    /// Store an active endpoint list.
    ZdoActiveEpStore {
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
        /// Endpoint ids.
        endpoints: Vec<u8>,
    },

    /// Store a simple descriptor.
    ZdoSimpleDescStore {
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
        /// Descriptor to store.
        desc: SimpleDescriptor,
    },

    /// Look up a cached device.
    ZdoFindNodeCache {
        /// Network address to look up.
        nwk_addr: ShortAddress,
        /// IEEE address fallback.
        ieee_addr: IeeeAddress,
    },

    /// Paginated cache table read-out.
    ZdoMgmtCache {
        /// First table index to return.
        start_index: u8,
    },

    /// Evict a cached device.
    ZdoRemoveNodeCache {
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
    },

    /// Read a configuration item.
    SapiReadConfiguration {
        /// Item key.
        key: u16,
    },

    /// Write a configuration item.
    SapiWriteConfiguration {
        /// Item key.
        key: u16,
        /// Item value.
        value: Vec<u8>,
    },

    /// Simple-API transmit with acknowledged delivery defaults.
    SapiSendData {
        /// Destination short address.
        destination: ShortAddress,
        /// Caller correlation handle.
        handle: u8,
        /// Frame payload.
        data: Vec<u8>,
    },
}

impl MtCommand {
    /// Decode a request envelope into a typed command.
    pub fn decode(envelope: &Envelope) -> Result<MtCommand, MtError> {
        let id = envelope.command_id;
        if id & (RESPONSE_BIT | CALLBACK_BIT) != 0 {
            return Err(MtError::NotARequest(id));
        }
        let mut r = Reader::new(&envelope.payload);
        let cmd = match id {
            SYS_RESET_REQ => MtCommand::SysReset {
                reset_type: r.get_u8()?,
            },
            SYS_PING => MtCommand::SysPing,
            SYS_VERSION => MtCommand::SysVersion,
            MAC_INIT => MtCommand::MacInit,
            MAC_DATA_REQ => {
                let destination = r.get_short_addr()?;
                let handle = r.get_u8()?;
                let options = TxOptions::from_byte(r.get_u8()?);
                let data = get_data(&mut r)?;
                MtCommand::MacDataReq {
                    destination,
                    handle,
                    options,
                    data,
                }
            }
            NWK_INIT => MtCommand::NwkInit,
            NWK_DATA_REQ => {
                let destination = r.get_short_addr()?;
                let handle = r.get_u8()?;
                let options = TxOptions::from_byte(r.get_u8()?);
                let radius = r.get_u8()?;
                let data = get_data(&mut r)?;
                MtCommand::NwkDataReq {
                    destination,
                    handle,
                    options,
                    radius,
                    data,
                }
            }
            NWK_POLL_IND => MtCommand::NwkPollInd {
                destination: r.get_short_addr()?,
            },
            AF_REGISTER => MtCommand::AfRegister {
                desc: SimpleDescriptor::decode(&mut r)?,
            },
            AF_DATA_REQ => {
                let destination = r.get_short_addr()?;
                let dst_endpoint = r.get_u8()?;
                let src_endpoint = r.get_u8()?;
                let cluster = r.get_u16_le()?;
                let handle = r.get_u8()?;
                let options = TxOptions::from_byte(r.get_u8()?);
                let data = get_data(&mut r)?;
                MtCommand::AfDataReq {
                    destination,
                    dst_endpoint,
                    src_endpoint,
                    cluster,
                    handle,
                    options,
                    data,
                }
            }
            ZDO_DISCOVERY_STORE => {
                let nwk_addr = r.get_short_addr()?;
                let ieee_addr = r.get_ieee_addr()?;
                let node_desc_size = r.get_u8()?;
                let power_desc_size = r.get_u8()?;
                let active_ep_count = r.get_u8()?;
                let simple_count = r.get_u8()? as usize;
                let simple_desc_sizes = r.get_bytes(simple_count)?.to_vec();
                MtCommand::ZdoDiscoveryStore {
                    req: DiscoveryStoreReq {
                        nwk_addr,
                        ieee_addr,
                        node_desc_size,
                        power_desc_size,
                        active_ep_count,
                        simple_desc_sizes,
                    },
                }
            }
            ZDO_NODE_DESC_STORE => MtCommand::ZdoNodeDescStore {
                nwk_addr: r.get_short_addr()?,
                ieee_addr: r.get_ieee_addr()?,
                desc: NodeDescriptor::decode(&mut r)?,
            },
            ZDO_POWER_DESC_STORE => MtCommand::ZdoPowerDescStore {
                nwk_addr: r.get_short_addr()?,
                ieee_addr: r.get_ieee_addr()?,
                desc: PowerDescriptor::decode(&mut r)?,
            },
            ZDO_ACTIVE_EP_STORE => {
                let nwk_addr = r.get_short_addr()?;
                let ieee_addr = r.get_ieee_addr()?;
                let endpoints = get_data(&mut r)?;
                MtCommand::ZdoActiveEpStore {
                    nwk_addr,
                    ieee_addr,
                    endpoints,
                }
            }
            ZDO_SIMPLE_DESC_STORE => MtCommand::ZdoSimpleDescStore {
                nwk_addr: r.get_short_addr()?,
                ieee_addr: r.get_ieee_addr()?,
                desc: SimpleDescriptor::decode(&mut r)?,
            },
            ZDO_FIND_NODE_CACHE => MtCommand::ZdoFindNodeCache {
                nwk_addr: r.get_short_addr()?,
                ieee_addr: r.get_ieee_addr()?,
            },
            ZDO_MGMT_CACHE => MtCommand::ZdoMgmtCache {
                start_index: r.get_u8()?,
            },
            ZDO_REMOVE_NODE_CACHE => MtCommand::ZdoRemoveNodeCache {
                nwk_addr: r.get_short_addr()?,
                ieee_addr: r.get_ieee_addr()?,
            },
            SAPI_READ_CFG => MtCommand::SapiReadConfiguration {
                key: r.get_u16_le()?,
            },
            SAPI_WRITE_CFG => {
                let key = r.get_u16_le()?;
                let value = get_data(&mut r)?;
                MtCommand::SapiWriteConfiguration { key, value }
            }
            SAPI_SEND_DATA => {
                let destination = r.get_short_addr()?;
                let handle = r.get_u8()?;
                let data = get_data(&mut r)?;
                MtCommand::SapiSendData {
                    destination,
                    handle,
                    data,
                }
            }
            other => return Err(MtError::UnknownCommand(other)),
        };
        Ok(cmd)
    }
}

/// Read a byte-length-prefixed blob.
fn get_data(r: &mut Reader<'_>) -> Result<Vec<u8>, zmesh_wire::WireError> {
    let len = r.get_u8()? as usize;
    Ok(r.get_bytes(len)?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ping() {
        let env = Envelope::new(SYS_PING, vec![]);
        assert_eq!(MtCommand::decode(&env).unwrap(), MtCommand::SysPing);
    }

    #[test]
    fn test_decode_nwk_data_req() {
        // dest 0x1234, handle 7, options expect_confirm, radius 5, 2 bytes.
        let env = Envelope::new(
            NWK_DATA_REQ,
            vec![0x34, 0x12, 0x07, 0x01, 0x05, 0x02, 0xAA, 0xBB],
        );
        match MtCommand::decode(&env).unwrap() {
            MtCommand::NwkDataReq {
                destination,
                handle,
                options,
                radius,
                data,
            } => {
                assert_eq!(destination, ShortAddress(0x1234));
                assert_eq!(handle, 7);
                assert!(options.expect_confirm);
                assert_eq!(radius, 5);
                assert_eq!(data, vec![0xAA, 0xBB]);
            }
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn test_decode_truncated_payload() {
        let env = Envelope::new(NWK_DATA_REQ, vec![0x34]);
        assert!(matches!(MtCommand::decode(&env), Err(MtError::Wire(_))));
    }

    #[test]
    fn test_unknown_and_non_request_ids() {
        let env = Envelope::new(0x00F3, vec![]);
        assert!(matches!(
            MtCommand::decode(&env),
            Err(MtError::UnknownCommand(0x00F3))
        ));

        let env = Envelope::new(SYS_PING | RESPONSE_BIT, vec![]);
        assert!(matches!(
            MtCommand::decode(&env),
            Err(MtError::NotARequest(_))
        ));
    }
}
