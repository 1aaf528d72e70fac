//! Envelope dispatch.
//!
//! The router terminates the framed serial transport: it reassembles
//! envelopes from the byte stream, decodes them into typed commands,
//! executes the matching handler against the stack state it owns, and
//! writes at most one response envelope back per request. Asynchronous
//! events (transmit confirms, hold expiries, reset indications) go out as
//! callback envelopes instead.
//!
//! Malformed frames and unknown command ids are logged and dropped
//! without a response; the peer recovers by its own timeout.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use zmesh_nwk::{
    AddReason, FrameKind, FrameRecord, FrameUser, MacDriver, MacReject, MacStatus, NwkConfig,
    TransmitScheduler, TxOptions, TxOutcome,
};
use zmesh_wire::{Envelope, EnvelopeCodec, ShortAddress, WireError, MAX_PAYLOAD};
use zmesh_zdo::{CacheServer, CacheServerConfig, SimpleDescriptor, ZdoStatus};

use crate::commands::MtCommand;
use crate::ids::*;
use crate::responses::*;

/// Outbound byte transport for response and callback frames.
pub trait Transport {
    /// Send one encoded envelope.
    fn send(&mut self, frame: &[u8]);
}

/// Persistent configuration storage.
pub trait NvStore {
    /// Read an item's value.
    fn read(&self, key: u16) -> Option<Vec<u8>>;
    /// Write an item. Returns false when the store refuses the write.
    fn write(&mut self, key: u16, value: &[u8]) -> bool;
    /// Length of an item, 0 when absent.
    fn item_len(&self, key: u16) -> usize;
}

/// The collaborator set a dispatch cycle runs against.
pub struct Drivers<'a> {
    /// Radio transmit primitive.
    pub mac: &'a mut dyn MacDriver,
    /// Response/callback byte sink.
    pub transport: &'a mut dyn Transport,
    /// Configuration persistence.
    pub nv: &'a mut dyn NvStore,
}

/// Router tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtConfig {
    /// Network layer configuration.
    pub nwk: NwkConfig,
    /// Discovery cache configuration.
    pub cache: CacheServerConfig,
    /// Maximum registrable local endpoints.
    pub max_endpoints: usize,
}

impl Default for MtConfig {
    fn default() -> Self {
        MtConfig {
            nwk: NwkConfig::default(),
            cache: CacheServerConfig::default(),
            max_endpoints: 8,
        }
    }
}

/// Command router owning the stack state.
pub struct MtRouter {
    config: MtConfig,
    codec: EnvelopeCodec,
    scheduler: TransmitScheduler,
    cache: CacheServer,
    endpoints: Vec<SimpleDescriptor>,
}

impl MtRouter {
    /// Create a router with empty stack state.
    pub fn new(config: MtConfig) -> Self {
        let scheduler = TransmitScheduler::new(config.nwk.clone());
        let cache = CacheServer::new(config.cache.clone());
        MtRouter {
            config,
            codec: EnvelopeCodec::new(),
            scheduler,
            cache,
            endpoints: Vec::new(),
        }
    }

    /// The transmit scheduler, for host-side inspection.
    pub fn scheduler(&self) -> &TransmitScheduler {
        &self.scheduler
    }

    /// The discovery cache, for host-side inspection.
    pub fn cache(&self) -> &CacheServer {
        &self.cache
    }

    /// Feed received bytes in and dispatch every complete envelope.
    ///
    /// Partial frames stay buffered until more bytes arrive. Each request
    /// produces at most one response before the next one is examined.
    pub fn receive(&mut self, bytes: &[u8], drivers: &mut Drivers<'_>) {
        self.codec.push(bytes);
        while let Some(frame) = self.codec.next_frame() {
            let envelope = match Envelope::decode(&frame) {
                Ok(envelope) => envelope,
                Err(e) => {
                    debug!("dropping malformed frame: {e}");
                    continue;
                }
            };
            let id = envelope.command_id;
            if Subsystem::of(id).is_none() {
                debug!("dropping envelope 0x{id:04X}: unknown subsystem");
                continue;
            }
            let command = match MtCommand::decode(&envelope) {
                Ok(command) => command,
                Err(e) => {
                    debug!("dropping envelope 0x{id:04X}: {e}");
                    continue;
                }
            };
            trace!("dispatching 0x{id:04X}");
            match self.dispatch(command, id, drivers) {
                Ok(Some(response)) => drivers.transport.send(&response.encode()),
                Ok(None) => {}
                Err(e) => debug!("response build failed for 0x{id:04X}: {e}"),
            }
        }
    }

    /// Drive buffered frames toward the MAC. Returns frames handed over.
    pub fn service(&mut self, mac: &mut dyn MacDriver) -> usize {
        self.scheduler.service(mac)
    }

    /// MAC transmit-confirmation entry point.
    ///
    /// Finalized frames are reported to the host as confirm callbacks;
    /// stale handles are dropped by the scheduler.
    pub fn mac_confirm(&mut self, handle: u8, status: MacStatus, transport: &mut dyn Transport) {
        if let Some(outcome) = self.scheduler.confirm(handle, status) {
            self.emit_confirm(outcome, transport);
        }
    }

    /// Periodic tick: broadcast pacing, indirect-hold expiry, cache aging.
    pub fn tick(&mut self, transport: &mut dyn Transport) {
        for outcome in self.scheduler.tick() {
            self.emit_confirm(outcome, transport);
        }
        self.cache.tick();
    }

    fn emit_confirm(&self, outcome: TxOutcome, transport: &mut dyn Transport) {
        let status = tx_status_byte(outcome.status);
        let callback = match outcome.user {
            FrameUser::Aps { endpoint, .. } => af_data_confirm(status, endpoint, outcome.handle),
            _ => nwk_data_confirm(status, outcome.handle),
        };
        transport.send(&callback.encode());
    }

    fn dispatch(
        &mut self,
        command: MtCommand,
        request_id: u16,
        drivers: &mut Drivers<'_>,
    ) -> Result<Option<Envelope>, WireError> {
        let response = match command {
            MtCommand::SysReset { reset_type } => {
                self.scheduler.reset();
                self.cache = CacheServer::new(self.config.cache.clone());
                self.endpoints.clear();
                drivers.transport.send(&reset_indication(reset_type).encode());
                None
            }
            MtCommand::SysPing => Some(ping_response(request_id)),
            MtCommand::SysVersion => Some(version_response(request_id)),

            MtCommand::MacInit => Some(status_response(request_id, ZdoStatus::Success)),
            MtCommand::MacDataReq {
                destination,
                handle,
                options,
                data,
            } => {
                let status = match drivers.mac.transmit(destination, &data, handle, options) {
                    Ok(()) => ZdoStatus::Success,
                    Err(MacReject::Busy) => ZdoStatus::InsufficientSpace,
                    Err(MacReject::FrameTooLarge) => ZdoStatus::NotPermitted,
                };
                Some(status_response(request_id, status))
            }

            MtCommand::NwkInit => {
                self.scheduler.reset();
                Some(status_response(request_id, ZdoStatus::Success))
            }
            MtCommand::NwkDataReq {
                destination,
                handle,
                options,
                radius: _,
                data,
            } => Some(self.enqueue(request_id, destination, data, handle, options, FrameUser::None)),
            MtCommand::NwkPollInd { destination } => {
                let released = self.scheduler.destination_available(destination);
                Some(poll_response(request_id, released as u8))
            }

            MtCommand::AfRegister { desc } => {
                let status = self.register_endpoint(desc);
                Some(status_response(request_id, status))
            }
            MtCommand::AfDataReq {
                destination,
                dst_endpoint: _,
                src_endpoint,
                cluster,
                handle,
                options,
                data,
            } => {
                if !self.endpoints.iter().any(|d| d.endpoint == src_endpoint) {
                    Some(status_response(request_id, ZdoStatus::InvalidRequestType))
                } else {
                    let user = FrameUser::Aps {
                        cluster,
                        endpoint: src_endpoint,
                    };
                    Some(self.enqueue(request_id, destination, data, handle, options, user))
                }
            }

            MtCommand::ZdoDiscoveryStore { req } => {
                Some(status_response(request_id, self.cache.process_store(&req)))
            }
            MtCommand::ZdoNodeDescStore {
                nwk_addr,
                ieee_addr,
                desc,
            } => Some(status_response(
                request_id,
                self.cache.process_node_desc_store(nwk_addr, ieee_addr, desc),
            )),
            MtCommand::ZdoPowerDescStore {
                nwk_addr,
                ieee_addr,
                desc,
            } => Some(status_response(
                request_id,
                self.cache.process_power_desc_store(nwk_addr, ieee_addr, desc),
            )),
            MtCommand::ZdoActiveEpStore {
                nwk_addr,
                ieee_addr,
                endpoints,
            } => Some(status_response(
                request_id,
                self.cache
                    .process_active_ep_store(nwk_addr, ieee_addr, &endpoints),
            )),
            MtCommand::ZdoSimpleDescStore {
                nwk_addr,
                ieee_addr,
                desc,
            } => Some(status_response(
                request_id,
                self.cache.process_simple_desc_store(nwk_addr, ieee_addr, desc),
            )),
            MtCommand::ZdoFindNodeCache {
                nwk_addr,
                ieee_addr,
            } => {
                let response = match self.cache.find_node_cache(nwk_addr, ieee_addr) {
                    Some(entry) => find_node_cache_response(
                        request_id,
                        ZdoStatus::Success,
                        entry.nwk_addr,
                        entry.ieee_addr,
                    )?,
                    None => find_node_cache_response(
                        request_id,
                        ZdoStatus::DeviceNotFound,
                        nwk_addr,
                        ieee_addr,
                    )?,
                };
                Some(response)
            }
            MtCommand::ZdoMgmtCache { start_index } => {
                let (total, entries) = self.cache.mgmt_cache(start_index);
                Some(mgmt_cache_response(request_id, total, start_index, &entries)?)
            }
            MtCommand::ZdoRemoveNodeCache {
                nwk_addr,
                ieee_addr,
            } => {
                let by_nwk = self.cache.remove_by_nwk(nwk_addr);
                let by_ieee = self.cache.remove_by_ieee(ieee_addr);
                let status = if by_nwk || by_ieee {
                    ZdoStatus::Success
                } else {
                    ZdoStatus::DeviceNotFound
                };
                Some(status_response(request_id, status))
            }

            MtCommand::SapiReadConfiguration { key } => {
                // Sized before reading: a value that cannot fit the
                // response payload gets a status, not a dropped reply.
                let response = if drivers.nv.item_len(key) + READ_CFG_OVERHEAD > MAX_PAYLOAD {
                    read_configuration_response(request_id, ZdoStatus::InsufficientSpace, key, &[])?
                } else {
                    match drivers.nv.read(key) {
                        Some(value) => read_configuration_response(
                            request_id,
                            ZdoStatus::Success,
                            key,
                            &value,
                        )?,
                        None => read_configuration_response(
                            request_id,
                            ZdoStatus::InvalidRequestType,
                            key,
                            &[],
                        )?,
                    }
                };
                Some(response)
            }
            MtCommand::SapiWriteConfiguration { key, value } => {
                let status = if drivers.nv.write(key, &value) {
                    ZdoStatus::Success
                } else {
                    ZdoStatus::NotPermitted
                };
                Some(status_response(request_id, status))
            }
            MtCommand::SapiSendData {
                destination,
                handle,
                data,
            } => {
                let options = TxOptions {
                    expect_confirm: true,
                    wait_for_ack: true,
                    ..TxOptions::default()
                };
                Some(self.enqueue(request_id, destination, data, handle, options, FrameUser::None))
            }
        };
        Ok(response)
    }

    fn register_endpoint(&mut self, desc: SimpleDescriptor) -> ZdoStatus {
        if !desc.clusters_in_bounds() {
            return ZdoStatus::NotPermitted;
        }
        if self.endpoints.iter().any(|d| d.endpoint == desc.endpoint) {
            return ZdoStatus::InvalidRequestType;
        }
        if self.endpoints.len() >= self.config.max_endpoints {
            return ZdoStatus::TableFull;
        }
        self.endpoints.push(desc);
        ZdoStatus::Success
    }

    fn enqueue(
        &mut self,
        request_id: u16,
        destination: ShortAddress,
        data: Vec<u8>,
        handle: u8,
        options: TxOptions,
        user: FrameUser,
    ) -> Envelope {
        let kind = if options.broadcast {
            FrameKind::Broadcast
        } else if options.force_indirect {
            FrameKind::Indirect
        } else {
            FrameKind::Direct
        };
        let record = FrameRecord::new(destination, data, handle, options).with_user(user);
        let status = match self.scheduler.enqueue(record, kind) {
            Ok(()) => ZdoStatus::Success,
            Err(e) => match e.reason {
                AddReason::PoolExhausted => ZdoStatus::InsufficientMemory,
                AddReason::DuplicateHandle(_) => ZdoStatus::NotPermitted,
            },
        };
        status_response(request_id, status)
    }
}
