//! Server-role discovery cache.
//!
//! A cache server holds descriptor sets for other devices in a bounded
//! table. A remote device first reserves a slot with a discovery-store
//! request (declaring the sizes it intends to upload), then populates the
//! slot with node/power/active-endpoint/simple-descriptor stores arriving
//! in any order. Populated slots age out passively on a periodic tick.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use zmesh_wire::{IeeeAddress, ShortAddress};

use crate::{
    NodeDescriptor, PowerDescriptor, SimpleDescriptor, ZdoStatus, NODE_DESC_SIZE,
    POWER_DESC_SIZE,
};

/// Cache server tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheServerConfig {
    /// Number of cacheable devices.
    pub capacity: usize,
    /// Ticks a populated entry lives without refresh.
    pub entry_lifetime: u16,
    /// Maximum endpoints one entry may register.
    pub max_endpoints: usize,
    /// Maximum entries returned per management-cache response page.
    pub page_size: usize,
}

impl Default for CacheServerConfig {
    fn default() -> Self {
        CacheServerConfig {
            capacity: 8,
            entry_lifetime: 60,
            max_endpoints: 8,
            page_size: 6,
        }
    }
}

/// Slot reservation request: the device declares what it will upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryStoreReq {
    /// Network address of the device to cache.
    pub nwk_addr: ShortAddress,
    /// IEEE address of the device to cache.
    pub ieee_addr: IeeeAddress,
    /// Declared node descriptor size.
    pub node_desc_size: u8,
    /// Declared power descriptor size.
    pub power_desc_size: u8,
    /// Declared active-endpoint count.
    pub active_ep_count: u8,
    /// Declared wire size of each simple descriptor to follow.
    pub simple_desc_sizes: Vec<u8>,
}

/// One endpoint registered in a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSlot {
    /// Endpoint id.
    pub endpoint: u8,
    /// Simple descriptor, once stored.
    pub simple: Option<SimpleDescriptor>,
}

/// A cached remote device's descriptor set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Network address; [`ShortAddress::INVALID`] never appears here (a
    /// free slot is simply absent from the table).
    pub nwk_addr: ShortAddress,
    /// IEEE address, unique across the table.
    pub ieee_addr: IeeeAddress,
    /// Remaining lifetime ticks.
    pub expiry: u16,
    /// Node descriptor, once stored.
    pub node_desc: Option<NodeDescriptor>,
    /// Power descriptor, once stored.
    pub power_desc: Option<PowerDescriptor>,
    /// Registered endpoints with their simple descriptors.
    pub endpoints: Vec<EndpointSlot>,
}

impl CacheEntry {
    /// Whether every declared field has arrived.
    pub fn is_populated(&self) -> bool {
        self.node_desc.is_some()
            && self.power_desc.is_some()
            && !self.endpoints.is_empty()
            && self.endpoints.iter().all(|e| e.simple.is_some())
    }
}

/// Bounded discovery cache table (server role).
#[derive(Debug)]
pub struct CacheServer {
    config: CacheServerConfig,
    entries: Vec<CacheEntry>,
}

impl CacheServer {
    /// Create an empty cache.
    pub fn new(config: CacheServerConfig) -> Self {
        let capacity = config.capacity;
        CacheServer {
            config,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reserve a slot for a device, purging any previous entry for the
    /// same network or IEEE address first (duplicate prevention).
    pub fn process_store(&mut self, req: &DiscoveryStoreReq) -> ZdoStatus {
        // Declared sizes must match the fixed descriptor layouts.
        if req.node_desc_size as usize != NODE_DESC_SIZE
            || req.power_desc_size as usize != POWER_DESC_SIZE
        {
            return ZdoStatus::NotPermitted;
        }
        if req.active_ep_count as usize > self.config.max_endpoints {
            return ZdoStatus::NotPermitted;
        }

        self.remove_by_ieee(req.ieee_addr);
        self.remove_by_nwk(req.nwk_addr);

        if self.entries.len() >= self.config.capacity {
            return ZdoStatus::InsufficientSpace;
        }

        trace!("cache slot reserved for {} / {}", req.nwk_addr, req.ieee_addr);
        self.entries.push(CacheEntry {
            nwk_addr: req.nwk_addr,
            ieee_addr: req.ieee_addr,
            expiry: self.config.entry_lifetime,
            node_desc: None,
            power_desc: None,
            endpoints: Vec::new(),
        });
        ZdoStatus::Success
    }

    fn entry_mut(
        &mut self,
        nwk_addr: ShortAddress,
        ieee_addr: IeeeAddress,
    ) -> Option<&mut CacheEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.nwk_addr == nwk_addr && e.ieee_addr == ieee_addr)
    }

    /// Store a device's node descriptor.
    pub fn process_node_desc_store(
        &mut self,
        nwk_addr: ShortAddress,
        ieee_addr: IeeeAddress,
        desc: NodeDescriptor,
    ) -> ZdoStatus {
        match self.entry_mut(nwk_addr, ieee_addr) {
            Some(entry) => {
                entry.node_desc = Some(desc);
                ZdoStatus::Success
            }
            None => ZdoStatus::DeviceNotFound,
        }
    }

    /// Store a device's power descriptor.
    pub fn process_power_desc_store(
        &mut self,
        nwk_addr: ShortAddress,
        ieee_addr: IeeeAddress,
        desc: PowerDescriptor,
    ) -> ZdoStatus {
        match self.entry_mut(nwk_addr, ieee_addr) {
            Some(entry) => {
                entry.power_desc = Some(desc);
                ZdoStatus::Success
            }
            None => ZdoStatus::DeviceNotFound,
        }
    }

    /// Register a device's active endpoint list.
    pub fn process_active_ep_store(
        &mut self,
        nwk_addr: ShortAddress,
        ieee_addr: IeeeAddress,
        endpoints: &[u8],
    ) -> ZdoStatus {
        let max = self.config.max_endpoints;
        match self.entry_mut(nwk_addr, ieee_addr) {
            Some(entry) => {
                if endpoints.len() > max {
                    return ZdoStatus::TableFull;
                }
                entry.endpoints = endpoints
                    .iter()
                    .map(|&ep| EndpointSlot {
                        endpoint: ep,
                        simple: None,
                    })
                    .collect();
                ZdoStatus::Success
            }
            None => ZdoStatus::DeviceNotFound,
        }
    }

    /// Store one simple descriptor.
    ///
    /// The endpoint must already be registered by an active-endpoint store
    /// and the cluster lists must fit the bounded capacity; otherwise the
    /// store is not permitted.
    pub fn process_simple_desc_store(
        &mut self,
        nwk_addr: ShortAddress,
        ieee_addr: IeeeAddress,
        desc: SimpleDescriptor,
    ) -> ZdoStatus {
        if !desc.clusters_in_bounds() {
            return ZdoStatus::NotPermitted;
        }
        match self.entry_mut(nwk_addr, ieee_addr) {
            Some(entry) => {
                match entry.endpoints.iter_mut().find(|e| e.endpoint == desc.endpoint) {
                    Some(slot) => {
                        slot.simple = Some(desc);
                        ZdoStatus::Success
                    }
                    None => ZdoStatus::NotPermitted,
                }
            }
            None => ZdoStatus::DeviceNotFound,
        }
    }

    /// Look up an entry by network address, falling back to IEEE address.
    pub fn find_node_cache(
        &self,
        nwk_addr: ShortAddress,
        ieee_addr: IeeeAddress,
    ) -> Option<&CacheEntry> {
        self.entries
            .iter()
            .find(|e| e.nwk_addr == nwk_addr)
            .or_else(|| self.entries.iter().find(|e| e.ieee_addr == ieee_addr))
    }

    /// Paginated read-out of the whole table for management queries.
    ///
    /// Returns the total entry count and the page starting at
    /// `start_index`, bounded by the configured page size (the
    /// max-message-size cutoff).
    pub fn mgmt_cache(&self, start_index: u8) -> (u8, Vec<(IeeeAddress, ShortAddress)>) {
        let total = self.entries.len() as u8;
        let page = self
            .entries
            .iter()
            .skip(start_index as usize)
            .take(self.config.page_size)
            .map(|e| (e.ieee_addr, e.nwk_addr))
            .collect();
        (total, page)
    }

    /// Remove the entry for a network address. Returns whether one existed.
    pub fn remove_by_nwk(&mut self, nwk_addr: ShortAddress) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.nwk_addr != nwk_addr);
        self.entries.len() != before
    }

    /// Remove the entry for an IEEE address. Returns whether one existed.
    pub fn remove_by_ieee(&mut self, ieee_addr: IeeeAddress) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.ieee_addr != ieee_addr);
        self.entries.len() != before
    }

    /// Age populated entries by one tick; expired entries are freed
    /// silently (passive expiry, no response is sent).
    pub fn tick(&mut self) {
        self.entries.retain_mut(|e| {
            if !e.is_populated() {
                return true;
            }
            e.expiry = e.expiry.saturating_sub(1);
            if e.expiry == 0 {
                debug!("cache entry for {} expired", e.nwk_addr);
                false
            } else {
                true
            }
        });
    }
}
