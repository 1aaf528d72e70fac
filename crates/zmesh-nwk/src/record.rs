//! Outbound frame records and their state machine.

use zmesh_wire::ShortAddress;

/// Lifecycle state of an outbound frame.
///
/// ```text
/// Init -> Waiting -> Scheduled -> Sent -> Confirmed -> Done
///            ^                               |
///            +--------- retry ---------------+
///            |
///          Hold  (sleeping destination; back to Waiting on poll)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Created, not yet owned by the pool.
    Init,
    /// In the pool, eligible for transmission.
    Waiting,
    /// Selected by the scheduler, about to be handed to the MAC.
    Scheduled,
    /// Handed to the MAC driver; a confirm is outstanding.
    Sent,
    /// MAC confirm received; retry-or-finalize pending.
    Confirmed,
    /// Parked for a sleeping destination (indirect delivery).
    Hold,
    /// Terminal; the record is released on this state.
    Done,
}

/// Transmit option flags carried by each frame.
///
/// One bit each on the wire; see [`TxOptions::to_byte`] for the layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Caller wants a transmit confirmation reported upward.
    pub expect_confirm: bool,
    /// Request MAC-level acknowledgement.
    pub wait_for_ack: bool,
    /// Broadcast frame (paced by the scheduler).
    pub broadcast: bool,
    /// Reflect the frame back to the local node as well.
    pub reflect: bool,
    /// Low-priority delayed transmission.
    pub delay: bool,
    /// High-priority delayed transmission (serviced before `delay`).
    pub hi_delay: bool,
    /// Bypass mesh routing; send direct to the destination.
    pub skip_routing: bool,
    /// Force indirect (held) delivery even for awake destinations.
    pub force_indirect: bool,
    /// Frame is currently subject to indirect-hold bookkeeping.
    pub indirect_hold: bool,
}

impl TxOptions {
    /// Pack the flags into a wire byte.
    ///
    /// Bit 0 = expect_confirm, 1 = wait_for_ack, 2 = broadcast,
    /// 3 = reflect, 4 = delay, 5 = hi_delay, 6 = skip_routing,
    /// 7 = force_indirect. `indirect_hold` is internal state and is not
    /// carried on the wire.
    pub fn to_byte(self) -> u8 {
        let mut b = 0u8;
        if self.expect_confirm {
            b |= 0x01;
        }
        if self.wait_for_ack {
            b |= 0x02;
        }
        if self.broadcast {
            b |= 0x04;
        }
        if self.reflect {
            b |= 0x08;
        }
        if self.delay {
            b |= 0x10;
        }
        if self.hi_delay {
            b |= 0x20;
        }
        if self.skip_routing {
            b |= 0x40;
        }
        if self.force_indirect {
            b |= 0x80;
        }
        b
    }

    /// Unpack flags from a wire byte.
    pub fn from_byte(b: u8) -> Self {
        TxOptions {
            expect_confirm: b & 0x01 != 0,
            wait_for_ack: b & 0x02 != 0,
            broadcast: b & 0x04 != 0,
            reflect: b & 0x08 != 0,
            delay: b & 0x10 != 0,
            hi_delay: b & 0x20 != 0,
            skip_routing: b & 0x40 != 0,
            force_indirect: b & 0x80 != 0,
            indirect_hold: false,
        }
    }
}

/// Opaque caller correlation data attached to a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameUser {
    /// No correlation data.
    None,
    /// Frame serves a ZDO transaction with this sequence number.
    Zdo {
        /// Transaction sequence number.
        seq: u8,
    },
    /// Frame serves an APS request.
    Aps {
        /// Cluster id.
        cluster: u16,
        /// Source endpoint.
        endpoint: u8,
    },
}

/// Scheduling class of a buffered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Normal unicast delivery.
    Direct,
    /// Held for a sleeping destination until it polls.
    Indirect,
    /// Broadcast delivery (paced).
    Broadcast,
}

/// One outbound network frame awaiting transmission.
///
/// Once [`FrameBufferPool::add`](crate::FrameBufferPool::add) accepts a
/// record, the pool owns it (payload included) until the single release
/// path drops it.
#[derive(Debug)]
pub struct FrameRecord {
    /// 16-bit mesh destination.
    pub destination: ShortAddress,
    /// Owned frame payload.
    pub payload: Vec<u8>,
    /// Caller-chosen correlation handle, unique among live records.
    pub handle: u8,
    /// Transmit option flags.
    pub options: TxOptions,
    /// Current lifecycle state.
    pub state: FrameState,
    /// Transmit attempts consumed so far (first attempt not counted).
    pub retries: u8,
    /// Caller correlation data.
    pub user: FrameUser,
    /// Scheduling class, fixed at `add` time.
    pub kind: FrameKind,
    /// Remaining hold ticks while in [`FrameState::Hold`].
    pub hold_ticks: u8,
    /// Insertion sequence, used for FIFO ordering within a class.
    pub(crate) seq: u64,
}

impl FrameRecord {
    /// Wrap a caller-owned payload into a fresh record (state `Init`).
    ///
    /// The record is not yet owned by any pool.
    pub fn new(
        destination: ShortAddress,
        payload: Vec<u8>,
        handle: u8,
        options: TxOptions,
    ) -> Self {
        FrameRecord {
            destination,
            payload,
            handle,
            options,
            state: FrameState::Init,
            retries: 0,
            user: FrameUser::None,
            kind: FrameKind::Direct,
            hold_ticks: 0,
            seq: 0,
        }
    }

    /// Attach caller correlation data.
    pub fn with_user(mut self, user: FrameUser) -> Self {
        self.user = user;
        self
    }

    /// Whether the frame is eligible for scheduler selection.
    pub fn is_waiting(&self) -> bool {
        self.state == FrameState::Waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_options_roundtrip() {
        let opts = TxOptions {
            expect_confirm: true,
            broadcast: true,
            hi_delay: true,
            force_indirect: true,
            ..Default::default()
        };
        assert_eq!(TxOptions::from_byte(opts.to_byte()), opts);
    }

    #[test]
    fn test_indirect_hold_not_on_wire() {
        let opts = TxOptions {
            indirect_hold: true,
            ..Default::default()
        };
        assert_eq!(opts.to_byte(), 0);
    }

    #[test]
    fn test_new_record_starts_init() {
        let rec = FrameRecord::new(
            ShortAddress(0x1234),
            vec![1, 2, 3],
            7,
            TxOptions::default(),
        );
        assert_eq!(rec.state, FrameState::Init);
        assert_eq!(rec.retries, 0);
        assert_eq!(rec.user, FrameUser::None);
    }
}
