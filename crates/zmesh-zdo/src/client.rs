//! Client-role discovery cache state machine.
//!
//! A device with no cache storage of its own uploads its descriptor set to
//! a cache server on the network. The upload is a linear sequence driven by
//! a fixed polling tick: clean any stale prior registration, find a server,
//! reserve a slot, then store each descriptor in turn. Every request is
//! stamped with a transaction sequence number and the client only accepts
//! the response matching its most recent request.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use zmesh_wire::{IeeeAddress, ShortAddress};

use crate::{
    DiscoveryStoreReq, NodeDescriptor, PowerDescriptor, SimpleDescriptor, ZdoStatus,
    NODE_DESC_SIZE, POWER_DESC_SIZE,
};

/// Cache client tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheClientConfig {
    /// Ticks to wait for a response before falling back to server search.
    pub poll_timeout: u16,
    /// Maximum network depth; the search radius wraps to 1 once it
    /// exceeds twice this value.
    pub max_network_depth: u8,
}

impl Default for CacheClientConfig {
    fn default() -> Self {
        CacheClientConfig {
            poll_timeout: 5,
            max_network_depth: 5,
        }
    }
}

/// The local device's identity and descriptor set to upload.
#[derive(Debug, Clone)]
pub struct LocalDevice {
    /// Own network address.
    pub nwk_addr: ShortAddress,
    /// Own IEEE address.
    pub ieee_addr: IeeeAddress,
    /// Own node descriptor.
    pub node_desc: NodeDescriptor,
    /// Own power descriptor.
    pub power_desc: PowerDescriptor,
    /// Simple descriptor per registered endpoint.
    pub simple_descs: Vec<SimpleDescriptor>,
}

/// Upload progress. One outbound command per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClientState {
    /// Settle tick before doing anything.
    Wait,
    /// Broadcast removal of any stale prior registration.
    Clean,
    /// Broadcast a server search at the current radius.
    Find,
    /// Reserve a slot on the discovered server.
    Request,
    /// Upload the node descriptor.
    NodeDescStore,
    /// Upload the power descriptor.
    PowerDescStore,
    /// Upload the active endpoint list.
    ActiveEpStore,
    /// Upload simple descriptors, one endpoint at a time.
    SimpleDescStore,
    /// Fully registered; polling is disabled.
    Done,
}

/// One outbound cache command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRequest {
    /// Remove any cached entry for this device.
    RemoveNodeCache {
        /// Transaction sequence number.
        seq: u8,
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
    },
    /// Search for a cache server holding (or willing to hold) this device.
    FindNodeCache {
        /// Transaction sequence number.
        seq: u8,
        /// Broadcast search radius in hops.
        radius: u8,
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
    },
    /// Reserve a cache slot.
    DiscoveryStore {
        /// Transaction sequence number.
        seq: u8,
        /// Slot reservation parameters.
        req: DiscoveryStoreReq,
    },
    /// Upload the node descriptor.
    NodeDescStore {
        /// Transaction sequence number.
        seq: u8,
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
        /// Descriptor to store.
        desc: NodeDescriptor,
    },
    /// Upload the power descriptor.
    PowerDescStore {
        /// Transaction sequence number.
        seq: u8,
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
        /// Descriptor to store.
        desc: PowerDescriptor,
    },
    /// Upload the active endpoint list.
    ActiveEpStore {
        /// Transaction sequence number.
        seq: u8,
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
        /// Endpoint ids.
        endpoints: Vec<u8>,
    },
    /// Upload one simple descriptor.
    SimpleDescStore {
        /// Transaction sequence number.
        seq: u8,
        /// Device network address.
        nwk_addr: ShortAddress,
        /// Device IEEE address.
        ieee_addr: IeeeAddress,
        /// Descriptor to store.
        desc: SimpleDescriptor,
    },
}

/// Outbound transport for cache commands.
pub trait CacheSender {
    /// Send a cache command to `destination` (broadcast for Clean/Find).
    fn send(&mut self, destination: ShortAddress, request: CacheRequest);
}

/// Descriptor-upload state machine (client role).
#[derive(Debug)]
pub struct CacheClient {
    config: CacheClientConfig,
    local: LocalDevice,
    state: CacheClientState,
    /// Sequence number of the outstanding request, if any.
    pending_seq: Option<u8>,
    next_seq: u8,
    timeout: u16,
    radius: u8,
    server: Option<ShortAddress>,
    ep_index: usize,
}

impl CacheClient {
    /// Create a client ready to start on the first tick.
    pub fn new(config: CacheClientConfig, local: LocalDevice) -> Self {
        CacheClient {
            config,
            local,
            state: CacheClientState::Wait,
            pending_seq: None,
            next_seq: 0,
            timeout: 0,
            radius: 1,
            server: None,
            ep_index: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> CacheClientState {
        self.state
    }

    /// Current server search radius.
    pub fn radius(&self) -> u8 {
        self.radius
    }

    /// Address of the discovered cache server, once found.
    pub fn server(&self) -> Option<ShortAddress> {
        self.server
    }

    /// Restart the upload from scratch, e.g. after an address change.
    pub fn invalidate(&mut self, nwk_addr: ShortAddress) {
        debug!("cache registration invalidated, new address {nwk_addr}");
        self.local.nwk_addr = nwk_addr;
        self.state = CacheClientState::Wait;
        self.pending_seq = None;
        self.radius = 1;
        self.server = None;
        self.ep_index = 0;
    }

    /// Drive the state machine by one polling tick.
    ///
    /// Issues the current state's command if none is outstanding, or ages
    /// the outstanding request and falls back to [`CacheClientState::Find`]
    /// with a widened radius when it times out.
    pub fn tick(&mut self, sender: &mut dyn CacheSender) {
        if self.state == CacheClientState::Done {
            return;
        }
        if self.pending_seq.is_some() {
            self.timeout = self.timeout.saturating_sub(1);
            if self.timeout == 0 {
                debug!("cache request timed out in {:?}", self.state);
                self.fall_back_to_find();
            }
            return;
        }
        self.issue(sender);
    }

    /// Accept a server-search answer. Ignored unless a Find with matching
    /// sequence number is outstanding.
    pub fn handle_find_response(&mut self, seq: u8, server: ShortAddress) {
        if self.state != CacheClientState::Find || self.pending_seq != Some(seq) {
            trace!("stale find response seq {seq} ignored");
            return;
        }
        self.server = Some(server);
        self.pending_seq = None;
        self.state = CacheClientState::Request;
    }

    /// Accept a store response. Stale sequence numbers are ignored; a
    /// failure status restarts the server search.
    pub fn handle_response(&mut self, seq: u8, status: ZdoStatus) {
        if self.pending_seq != Some(seq) {
            trace!("stale response seq {seq} ignored");
            return;
        }
        if !status.is_success() {
            debug!("cache store failed in {:?}: {status}", self.state);
            self.fall_back_to_find();
            return;
        }
        self.pending_seq = None;
        self.state = match self.state {
            CacheClientState::Request => CacheClientState::NodeDescStore,
            CacheClientState::NodeDescStore => CacheClientState::PowerDescStore,
            CacheClientState::PowerDescStore => CacheClientState::ActiveEpStore,
            CacheClientState::ActiveEpStore => {
                if self.local.simple_descs.is_empty() {
                    CacheClientState::Done
                } else {
                    self.ep_index = 0;
                    CacheClientState::SimpleDescStore
                }
            }
            CacheClientState::SimpleDescStore => {
                self.ep_index += 1;
                if self.ep_index >= self.local.simple_descs.len() {
                    CacheClientState::Done
                } else {
                    CacheClientState::SimpleDescStore
                }
            }
            other => other,
        };
        if self.state == CacheClientState::Done {
            debug!("descriptor upload complete, polling disabled");
        }
    }

    fn fall_back_to_find(&mut self) {
        self.pending_seq = None;
        self.server = None;
        self.radius += 1;
        if self.radius > 2 * self.config.max_network_depth {
            self.radius = 1;
        }
        self.state = CacheClientState::Find;
    }

    fn take_seq(&mut self) -> u8 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    fn issue(&mut self, sender: &mut dyn CacheSender) {
        let nwk_addr = self.local.nwk_addr;
        let ieee_addr = self.local.ieee_addr;
        match self.state {
            CacheClientState::Wait => {
                // Settle tick, nothing goes out.
                self.state = CacheClientState::Clean;
            }
            CacheClientState::Clean => {
                // Fire and forget; no server answers a broadcast removal.
                let seq = self.take_seq();
                sender.send(
                    ShortAddress::BROADCAST,
                    CacheRequest::RemoveNodeCache {
                        seq,
                        nwk_addr,
                        ieee_addr,
                    },
                );
                self.state = CacheClientState::Find;
            }
            CacheClientState::Find => {
                let seq = self.take_seq();
                sender.send(
                    ShortAddress::BROADCAST,
                    CacheRequest::FindNodeCache {
                        seq,
                        radius: self.radius,
                        nwk_addr,
                        ieee_addr,
                    },
                );
                self.arm(seq);
            }
            CacheClientState::Request => {
                let seq = self.take_seq();
                let req = DiscoveryStoreReq {
                    nwk_addr,
                    ieee_addr,
                    node_desc_size: NODE_DESC_SIZE as u8,
                    power_desc_size: POWER_DESC_SIZE as u8,
                    active_ep_count: self.local.simple_descs.len() as u8,
                    simple_desc_sizes: self
                        .local
                        .simple_descs
                        .iter()
                        .map(|d| d.wire_size() as u8)
                        .collect(),
                };
                self.unicast(sender, CacheRequest::DiscoveryStore { seq, req });
                self.arm(seq);
            }
            CacheClientState::NodeDescStore => {
                let seq = self.take_seq();
                let desc = self.local.node_desc;
                self.unicast(
                    sender,
                    CacheRequest::NodeDescStore {
                        seq,
                        nwk_addr,
                        ieee_addr,
                        desc,
                    },
                );
                self.arm(seq);
            }
            CacheClientState::PowerDescStore => {
                let seq = self.take_seq();
                let desc = self.local.power_desc;
                self.unicast(
                    sender,
                    CacheRequest::PowerDescStore {
                        seq,
                        nwk_addr,
                        ieee_addr,
                        desc,
                    },
                );
                self.arm(seq);
            }
            CacheClientState::ActiveEpStore => {
                let seq = self.take_seq();
                let endpoints = self.local.simple_descs.iter().map(|d| d.endpoint).collect();
                self.unicast(
                    sender,
                    CacheRequest::ActiveEpStore {
                        seq,
                        nwk_addr,
                        ieee_addr,
                        endpoints,
                    },
                );
                self.arm(seq);
            }
            CacheClientState::SimpleDescStore => {
                let seq = self.take_seq();
                let desc = self.local.simple_descs[self.ep_index].clone();
                self.unicast(
                    sender,
                    CacheRequest::SimpleDescStore {
                        seq,
                        nwk_addr,
                        ieee_addr,
                        desc,
                    },
                );
                self.arm(seq);
            }
            CacheClientState::Done => {}
        }
    }

    fn unicast(&mut self, sender: &mut dyn CacheSender, request: CacheRequest) {
        // A unicast state is only reachable after Find discovered a server.
        let destination = self.server.unwrap_or(ShortAddress::BROADCAST);
        sender.send(destination, request);
    }

    fn arm(&mut self, seq: u8) {
        self.pending_seq = Some(seq);
        self.timeout = self.config.poll_timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSender {
        sent: Vec<(ShortAddress, CacheRequest)>,
    }

    impl CacheSender for RecordingSender {
        fn send(&mut self, destination: ShortAddress, request: CacheRequest) {
            self.sent.push((destination, request));
        }
    }

    fn local() -> LocalDevice {
        LocalDevice {
            nwk_addr: ShortAddress(0x1234),
            ieee_addr: IeeeAddress([0x11; 8]),
            node_desc: NodeDescriptor::default(),
            power_desc: PowerDescriptor::default(),
            simple_descs: vec![
                SimpleDescriptor {
                    endpoint: 1,
                    profile_id: 0x0104,
                    ..Default::default()
                },
                SimpleDescriptor {
                    endpoint: 2,
                    profile_id: 0x0104,
                    ..Default::default()
                },
            ],
        }
    }

    fn client(poll_timeout: u16, max_network_depth: u8) -> CacheClient {
        CacheClient::new(
            CacheClientConfig {
                poll_timeout,
                max_network_depth,
            },
            local(),
        )
    }

    fn last_seq(sender: &RecordingSender) -> u8 {
        match sender.sent.last().map(|(_, r)| r) {
            Some(CacheRequest::FindNodeCache { seq, .. })
            | Some(CacheRequest::DiscoveryStore { seq, .. })
            | Some(CacheRequest::NodeDescStore { seq, .. })
            | Some(CacheRequest::PowerDescStore { seq, .. })
            | Some(CacheRequest::ActiveEpStore { seq, .. })
            | Some(CacheRequest::SimpleDescStore { seq, .. })
            | Some(CacheRequest::RemoveNodeCache { seq, .. }) => *seq,
            None => panic!("nothing sent"),
        }
    }

    #[test]
    fn test_startup_sequence() {
        let mut c = client(5, 5);
        let mut s = RecordingSender::default();

        c.tick(&mut s); // Wait -> Clean
        assert_eq!(c.state(), CacheClientState::Clean);
        assert!(s.sent.is_empty());

        c.tick(&mut s); // Clean broadcast, advance to Find
        assert_eq!(c.state(), CacheClientState::Find);
        assert!(matches!(
            s.sent[0],
            (ShortAddress::BROADCAST, CacheRequest::RemoveNodeCache { .. })
        ));

        c.tick(&mut s); // Find broadcast at radius 1
        assert!(matches!(
            s.sent[1].1,
            CacheRequest::FindNodeCache { radius: 1, .. }
        ));
    }

    #[test]
    fn test_find_timeouts_widen_radius() {
        let mut c = client(2, 5);
        let mut s = RecordingSender::default();
        c.tick(&mut s); // Wait
        c.tick(&mut s); // Clean
        c.tick(&mut s); // Find issued, radius 1

        // First timeout: two aging ticks, then the re-issue tick.
        c.tick(&mut s);
        c.tick(&mut s);
        assert_eq!(c.state(), CacheClientState::Find);
        assert_eq!(c.radius(), 2);
        c.tick(&mut s); // re-issue at radius 2

        // Second timeout.
        c.tick(&mut s);
        c.tick(&mut s);
        assert_eq!(c.state(), CacheClientState::Find);
        assert_eq!(c.radius(), 3);
    }

    #[test]
    fn test_radius_wraps_past_twice_network_depth() {
        let mut c = client(1, 2); // bound is 4
        let mut s = RecordingSender::default();
        c.tick(&mut s); // Wait
        c.tick(&mut s); // Clean

        // Each pair of ticks issues a Find and times it out.
        for expected in [2u8, 3, 4, 1, 2] {
            c.tick(&mut s); // issue
            c.tick(&mut s); // timeout
            assert_eq!(c.radius(), expected);
        }
    }

    #[test]
    fn test_full_upload_reaches_done() {
        let mut c = client(5, 5);
        let mut s = RecordingSender::default();
        let server = ShortAddress(0x0001);

        c.tick(&mut s); // Wait
        c.tick(&mut s); // Clean
        c.tick(&mut s); // Find
        c.handle_find_response(last_seq(&s), server);
        assert_eq!(c.state(), CacheClientState::Request);
        assert_eq!(c.server(), Some(server));

        // Request through both simple descriptors, success each step.
        for _ in 0..6 {
            c.tick(&mut s);
            assert_eq!(s.sent.last().map(|(d, _)| *d), Some(server));
            c.handle_response(last_seq(&s), ZdoStatus::Success);
        }
        assert_eq!(c.state(), CacheClientState::Done);

        // Done disables polling.
        let sent_before = s.sent.len();
        c.tick(&mut s);
        assert_eq!(s.sent.len(), sent_before);
    }

    #[test]
    fn test_stale_seq_ignored() {
        let mut c = client(5, 5);
        let mut s = RecordingSender::default();
        c.tick(&mut s);
        c.tick(&mut s);
        c.tick(&mut s); // Find outstanding

        let seq = last_seq(&s);
        c.handle_find_response(seq.wrapping_add(7), ShortAddress(0x0001));
        assert_eq!(c.state(), CacheClientState::Find);
        assert_eq!(c.server(), None);

        c.handle_find_response(seq, ShortAddress(0x0001));
        assert_eq!(c.state(), CacheClientState::Request);
    }

    #[test]
    fn test_store_failure_restarts_search() {
        let mut c = client(5, 5);
        let mut s = RecordingSender::default();
        c.tick(&mut s);
        c.tick(&mut s);
        c.tick(&mut s);
        c.handle_find_response(last_seq(&s), ShortAddress(0x0001));

        c.tick(&mut s); // DiscoveryStore
        c.handle_response(last_seq(&s), ZdoStatus::InsufficientSpace);
        assert_eq!(c.state(), CacheClientState::Find);
        assert_eq!(c.radius(), 2);
        assert_eq!(c.server(), None);
    }

    #[test]
    fn test_invalidate_restarts_from_wait() {
        let mut c = client(5, 5);
        let mut s = RecordingSender::default();
        c.tick(&mut s);
        c.tick(&mut s);
        c.tick(&mut s);
        c.handle_find_response(last_seq(&s), ShortAddress(0x0001));
        for _ in 0..6 {
            c.tick(&mut s);
            c.handle_response(last_seq(&s), ZdoStatus::Success);
        }
        assert_eq!(c.state(), CacheClientState::Done);

        c.invalidate(ShortAddress(0x5678));
        assert_eq!(c.state(), CacheClientState::Wait);
        c.tick(&mut s);
        assert_eq!(c.state(), CacheClientState::Clean);
    }
}
