//! Device descriptor value types and their wire codecs.
//!
//! Store requests carry the sizes of the descriptors a device intends to
//! upload; the cache validates those against the sizes defined here before
//! reserving a slot.

use zmesh_wire::{Reader, WireError, Writer};

/// Wire size of a node descriptor.
pub const NODE_DESC_SIZE: usize = 8;

/// Wire size of a power descriptor.
pub const POWER_DESC_SIZE: usize = 2;

/// Maximum clusters per direction in one simple descriptor.
pub const MAX_CLUSTERS: usize = 16;

/// Device role bits of a node descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicalType {
    /// Network coordinator.
    Coordinator,
    /// Mesh router.
    Router,
    /// Sleepy end device.
    #[default]
    EndDevice,
}

impl LogicalType {
    fn to_byte(self) -> u8 {
        match self {
            LogicalType::Coordinator => 0,
            LogicalType::Router => 1,
            LogicalType::EndDevice => 2,
        }
    }

    fn from_byte(b: u8) -> Self {
        match b & 0x07 {
            0 => LogicalType::Coordinator,
            1 => LogicalType::Router,
            _ => LogicalType::EndDevice,
        }
    }
}

/// Static capabilities of a device.
///
/// Format: logical_type(1) + frequency_band(1) + capability(1) +
/// manufacturer(2) + max_buffer(1) + max_transfer(2) = 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeDescriptor {
    /// Coordinator, router, or end device.
    pub logical_type: LogicalType,
    /// Supported frequency band bitmap.
    pub frequency_band: u8,
    /// MAC capability flags.
    pub capability: u8,
    /// Manufacturer code.
    pub manufacturer: u16,
    /// Largest NWK payload buffer, bytes.
    pub max_buffer_size: u8,
    /// Largest transferable data unit, bytes.
    pub max_transfer_size: u16,
}

impl NodeDescriptor {
    /// Encode into a payload writer.
    pub fn encode(&self, w: &mut Writer) -> Result<(), WireError> {
        w.put_u8(self.logical_type.to_byte())?;
        w.put_u8(self.frequency_band)?;
        w.put_u8(self.capability)?;
        w.put_u16_le(self.manufacturer)?;
        w.put_u8(self.max_buffer_size)?;
        w.put_u16_le(self.max_transfer_size)
    }

    /// Decode from a payload reader.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(NodeDescriptor {
            logical_type: LogicalType::from_byte(r.get_u8()?),
            frequency_band: r.get_u8()?,
            capability: r.get_u8()?,
            manufacturer: r.get_u16_le()?,
            max_buffer_size: r.get_u8()?,
            max_transfer_size: r.get_u16_le()?,
        })
    }
}

/// Power source and level of a device.
///
/// Format: (current_mode | available_sources << 4)(1) +
/// (current_source | current_level << 4)(1) = 2 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerDescriptor {
    /// Current power mode nibble.
    pub current_mode: u8,
    /// Available power sources bitmap nibble.
    pub available_sources: u8,
    /// Currently used source nibble.
    pub current_source: u8,
    /// Charge level nibble.
    pub current_level: u8,
}

impl PowerDescriptor {
    /// Encode into a payload writer.
    pub fn encode(&self, w: &mut Writer) -> Result<(), WireError> {
        w.put_u8((self.current_mode & 0x0F) | (self.available_sources << 4))?;
        w.put_u8((self.current_source & 0x0F) | (self.current_level << 4))
    }

    /// Decode from a payload reader.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let a = r.get_u8()?;
        let b = r.get_u8()?;
        Ok(PowerDescriptor {
            current_mode: a & 0x0F,
            available_sources: a >> 4,
            current_source: b & 0x0F,
            current_level: b >> 4,
        })
    }
}

/// Application profile exposed by one endpoint.
///
/// Format: endpoint(1) + profile(2) + device(2) + version(1) +
/// in_count(1) + in_clusters(2*n) + out_count(1) + out_clusters(2*m).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleDescriptor {
    /// Endpoint id (1..240).
    pub endpoint: u8,
    /// Application profile id.
    pub profile_id: u16,
    /// Device id within the profile.
    pub device_id: u16,
    /// Device version nibble.
    pub device_version: u8,
    /// Input (server-side) cluster ids, bounded by [`MAX_CLUSTERS`].
    pub in_clusters: Vec<u16>,
    /// Output (client-side) cluster ids, bounded by [`MAX_CLUSTERS`].
    pub out_clusters: Vec<u16>,
}

impl SimpleDescriptor {
    /// Wire size of this descriptor in bytes.
    pub fn wire_size(&self) -> usize {
        8 + 2 * self.in_clusters.len() + 2 * self.out_clusters.len()
    }

    /// Whether the cluster lists fit the bounded capacity.
    pub fn clusters_in_bounds(&self) -> bool {
        self.in_clusters.len() <= MAX_CLUSTERS && self.out_clusters.len() <= MAX_CLUSTERS
    }

    /// Encode into a payload writer.
    pub fn encode(&self, w: &mut Writer) -> Result<(), WireError> {
        w.put_u8(self.endpoint)?;
        w.put_u16_le(self.profile_id)?;
        w.put_u16_le(self.device_id)?;
        w.put_u8(self.device_version)?;
        w.put_u8(self.in_clusters.len() as u8)?;
        for c in &self.in_clusters {
            w.put_u16_le(*c)?;
        }
        w.put_u8(self.out_clusters.len() as u8)?;
        for c in &self.out_clusters {
            w.put_u16_le(*c)?;
        }
        Ok(())
    }

    /// Decode from a payload reader.
    ///
    /// Cluster counts past [`MAX_CLUSTERS`] are refused before their lists
    /// are read.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let endpoint = r.get_u8()?;
        let profile_id = r.get_u16_le()?;
        let device_id = r.get_u16_le()?;
        let device_version = r.get_u8()?;

        let in_count = r.get_u8()? as usize;
        if in_count > MAX_CLUSTERS {
            return Err(WireError::Overflow {
                capacity: MAX_CLUSTERS,
                reach: in_count,
            });
        }
        let mut in_clusters = Vec::with_capacity(in_count);
        for _ in 0..in_count {
            in_clusters.push(r.get_u16_le()?);
        }

        let out_count = r.get_u8()? as usize;
        if out_count > MAX_CLUSTERS {
            return Err(WireError::Overflow {
                capacity: MAX_CLUSTERS,
                reach: out_count,
            });
        }
        let mut out_clusters = Vec::with_capacity(out_count);
        for _ in 0..out_count {
            out_clusters.push(r.get_u16_le()?);
        }

        Ok(SimpleDescriptor {
            endpoint,
            profile_id,
            device_id,
            device_version,
            in_clusters,
            out_clusters,
        })
    }
}
