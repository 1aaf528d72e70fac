//! Transmit scheduling and MAC confirm processing.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zmesh_wire::ShortAddress;

use crate::{
    AddError, FrameBufferPool, FrameKind, FrameRecord, FrameState, FrameUser, TxOptions,
};

/// Network-layer tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NwkConfig {
    /// Number of slots in the frame buffer pool.
    pub pool_capacity: usize,
    /// Retries after the first attempt; a persistently failing frame makes
    /// `max_frame_retries + 1` attempts total.
    pub max_frame_retries: u8,
    /// Ticks between broadcast transmissions (pacing, not protocol).
    pub broadcast_spacing: u8,
    /// Hold countdown for indirect frames, in ticks.
    pub indirect_hold_timeout: u8,
}

impl Default for NwkConfig {
    fn default() -> Self {
        NwkConfig {
            pool_capacity: 16,
            max_frame_retries: 3,
            broadcast_spacing: 2,
            indirect_hold_timeout: 7,
        }
    }
}

/// Immediate rejection from the MAC transmit primitive.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacReject {
    /// Radio is mid-transmission; try again next service pass.
    #[error("MAC busy")]
    Busy,
    /// Frame is too large for the MAC payload.
    #[error("frame too large for MAC")]
    FrameTooLarge,
}

/// Status carried by an asynchronous MAC transmit confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacStatus {
    /// Frame was delivered (and acknowledged, where requested).
    Success,
    /// No acknowledgement from the destination.
    NoAck,
    /// Channel access failed (CSMA gave up).
    ChannelAccessFailure,
    /// The MAC expired the transaction internally.
    TransactionExpired,
}

impl MacStatus {
    /// Whether this confirm counts as a delivery.
    pub fn is_success(self) -> bool {
        self == MacStatus::Success
    }
}

/// External MAC driver boundary.
///
/// The driver either accepts the frame (a confirm for `handle` will arrive
/// later via [`TransmitScheduler::confirm`]) or rejects it immediately.
/// The confirm contract is the driver's: every accepted frame is eventually
/// confirmed, success or failure.
pub trait MacDriver {
    /// Hand one frame to the radio.
    fn transmit(
        &mut self,
        destination: ShortAddress,
        payload: &[u8],
        handle: u8,
        options: TxOptions,
    ) -> Result<(), MacReject>;
}

/// Final disposition of a frame, reported upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// The frame's correlation handle.
    pub handle: u8,
    /// Destination the frame was addressed to.
    pub destination: ShortAddress,
    /// How the frame ended.
    pub status: TxStatus,
    /// Caller correlation data carried by the frame.
    pub user: FrameUser,
}

/// Terminal status of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Confirmed delivered.
    Delivered,
    /// Failed every attempt up to the retry bound.
    RetriesExhausted,
    /// Indirect hold expired before the destination polled.
    HoldExpired,
}

/// Drives buffered frames through their transmit lifecycle.
///
/// Owns the [`FrameBufferPool`]; every mutation of frame state after `add`
/// goes through here.
#[derive(Debug)]
pub struct TransmitScheduler {
    pool: FrameBufferPool,
    config: NwkConfig,
    /// Ticks until the next broadcast may go out.
    broadcast_countdown: u8,
}

impl TransmitScheduler {
    /// Create a scheduler and its backing pool from config.
    pub fn new(config: NwkConfig) -> Self {
        TransmitScheduler {
            pool: FrameBufferPool::new(config.pool_capacity),
            config,
            broadcast_countdown: 0,
        }
    }

    /// Shared access to the pool.
    pub fn pool(&self) -> &FrameBufferPool {
        &self.pool
    }

    /// Mutable access to the pool.
    pub fn pool_mut(&mut self) -> &mut FrameBufferPool {
        &mut self.pool
    }

    /// Enqueue a frame for transmission.
    ///
    /// Indirect frames enter `Hold` with the configured countdown; all
    /// others enter `Waiting`. Failure hands the record back to the
    /// caller inside the error.
    pub fn enqueue(&mut self, record: FrameRecord, kind: FrameKind) -> Result<(), AddError> {
        let hold = if kind == FrameKind::Indirect {
            self.config.indirect_hold_timeout
        } else {
            0
        };
        self.pool.add(record, kind, hold)
    }

    /// Whether another frame to `destination` is already in flight.
    fn destination_busy(&self, destination: ShortAddress) -> bool {
        self.pool.iter().any(|r| {
            r.destination == destination
                && matches!(r.state, FrameState::Scheduled | FrameState::Sent)
        })
    }

    /// Priority class of a waiting record: hi-delay first, then normal,
    /// then low-delay. FIFO (insertion seq) breaks ties.
    fn priority_class(record: &FrameRecord) -> u8 {
        if record.options.hi_delay {
            0
        } else if record.options.delay {
            2
        } else {
            1
        }
    }

    /// Pick the next eligible waiting record, if any.
    fn select(&self) -> Option<u8> {
        self.pool
            .iter()
            .filter(|r| r.is_waiting())
            .filter(|r| !self.destination_busy(r.destination))
            .filter(|r| !r.options.broadcast || self.broadcast_countdown == 0)
            .min_by_key(|r| (Self::priority_class(r), r.seq))
            .map(|r| r.handle)
    }

    /// Hand eligible waiting frames to the MAC driver.
    ///
    /// Transmits until no candidate is eligible or the MAC reports busy;
    /// returns the number of frames handed over.
    pub fn service(&mut self, mac: &mut dyn MacDriver) -> usize {
        let mut sent = 0;
        while let Some(handle) = self.select() {
            let Some(rec) = self.pool.find_by_handle_mut(handle) else {
                break;
            };
            rec.state = FrameState::Scheduled;
            let destination = rec.destination;
            let options = rec.options;
            let is_broadcast = options.broadcast;
            // Borrow ends before the MAC call; re-find to update state.
            let payload = rec.payload.clone();

            match mac.transmit(destination, &payload, handle, options) {
                Ok(()) => {
                    if let Some(rec) = self.pool.find_by_handle_mut(handle) {
                        rec.state = FrameState::Sent;
                    }
                    if is_broadcast {
                        self.broadcast_countdown = self.config.broadcast_spacing;
                    }
                    trace!("handle 0x{:02X} sent to {}", handle, destination);
                    sent += 1;
                }
                Err(reject) => {
                    // Back to Waiting; the next service pass retries.
                    if let Some(rec) = self.pool.find_by_handle_mut(handle) {
                        rec.state = FrameState::Waiting;
                    }
                    debug!("MAC rejected handle 0x{:02X}: {}", handle, reject);
                    break;
                }
            }
        }
        sent
    }

    /// Process an asynchronous MAC transmit confirmation.
    ///
    /// Success finalizes the frame; failure retries until the bound, then
    /// finalizes with [`TxStatus::RetriesExhausted`]. A confirm for an
    /// unknown or not-`Sent` handle is a stale hardware event: logged and
    /// discarded.
    pub fn confirm(&mut self, handle: u8, status: MacStatus) -> Option<TxOutcome> {
        let max_retries = self.config.max_frame_retries;
        let rec = match self.pool.find_by_handle_mut(handle) {
            Some(rec) if rec.state == FrameState::Sent => rec,
            _ => {
                debug!("stale MAC confirm for handle 0x{:02X} discarded", handle);
                return None;
            }
        };
        rec.state = FrameState::Confirmed;

        if status.is_success() {
            rec.state = FrameState::Done;
            let rec = self.pool.remove(handle)?;
            return Some(TxOutcome {
                handle,
                destination: rec.destination,
                status: TxStatus::Delivered,
                user: rec.user,
            });
        }

        rec.retries += 1;
        if rec.retries <= max_retries {
            trace!(
                "handle 0x{:02X} retry {}/{}",
                handle,
                rec.retries,
                max_retries
            );
            rec.state = FrameState::Waiting;
            return None;
        }

        rec.state = FrameState::Done;
        let rec = self.pool.remove(handle)?;
        Some(TxOutcome {
            handle,
            destination: rec.destination,
            status: TxStatus::RetriesExhausted,
            user: rec.user,
        })
    }

    /// A sleeping destination announced availability (poll/indirect
    /// delivery): release its held frames back to `Waiting`. Returns the
    /// number of frames released.
    pub fn destination_available(&mut self, destination: ShortAddress) -> usize {
        let mut released = 0;
        for rec in self.pool.iter_mut() {
            if rec.destination == destination && rec.state == FrameState::Hold {
                rec.state = FrameState::Waiting;
                rec.hold_ticks = 0;
                released += 1;
            }
        }
        released
    }

    /// Advance timers by one tick: broadcast pacing and indirect holds.
    ///
    /// Expired holds are finalized and reported as outcomes.
    pub fn tick(&mut self) -> Vec<TxOutcome> {
        self.broadcast_countdown = self.broadcast_countdown.saturating_sub(1);
        self.pool
            .tick()
            .into_iter()
            .map(|rec| TxOutcome {
                handle: rec.handle,
                destination: rec.destination,
                status: TxStatus::HoldExpired,
                user: rec.user,
            })
            .collect()
    }

    /// Drop every buffered frame (network reset).
    pub fn reset(&mut self) {
        self.pool.reset();
        self.broadcast_countdown = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameUser;

    /// MAC stub that records transmit calls and answers per a script.
    struct MockMac {
        transmits: Vec<(ShortAddress, u8)>,
        reject: Option<MacReject>,
    }

    impl MockMac {
        fn new() -> Self {
            MockMac {
                transmits: Vec::new(),
                reject: None,
            }
        }
    }

    impl MacDriver for MockMac {
        fn transmit(
            &mut self,
            destination: ShortAddress,
            _payload: &[u8],
            handle: u8,
            _options: TxOptions,
        ) -> Result<(), MacReject> {
            if let Some(reject) = self.reject {
                return Err(reject);
            }
            self.transmits.push((destination, handle));
            Ok(())
        }
    }

    fn sched() -> TransmitScheduler {
        TransmitScheduler::new(NwkConfig::default())
    }

    fn frame(handle: u8, dest: u16, options: TxOptions) -> FrameRecord {
        FrameRecord::new(ShortAddress(dest), vec![0xAA, 0xBB], handle, options)
    }

    #[test]
    fn test_lifecycle_success() {
        // Scenario: handle 7 to 0x1234, expect_confirm; add, send, confirm
        // success; the record must then be gone.
        let mut s = sched();
        let mut mac = MockMac::new();
        let opts = TxOptions {
            expect_confirm: true,
            ..Default::default()
        };
        s.enqueue(frame(7, 0x1234, opts), FrameKind::Direct).unwrap();
        assert_eq!(
            s.pool().find_by_handle(7).unwrap().state,
            FrameState::Waiting
        );

        assert_eq!(s.service(&mut mac), 1);
        assert_eq!(s.pool().find_by_handle(7).unwrap().state, FrameState::Sent);
        assert_eq!(mac.transmits, vec![(ShortAddress(0x1234), 7)]);

        let outcome = s.confirm(7, MacStatus::Success).expect("outcome");
        assert_eq!(outcome.status, TxStatus::Delivered);
        assert!(s.pool().find_by_handle(7).is_none());
    }

    #[test]
    fn test_retry_bound_is_max_plus_one_attempts() {
        let mut config = NwkConfig::default();
        config.max_frame_retries = 2;
        let mut s = TransmitScheduler::new(config);
        let mut mac = MockMac::new();

        s.enqueue(frame(1, 0x10, TxOptions::default()), FrameKind::Direct)
            .unwrap();

        let mut attempts = 0;
        let outcome = loop {
            attempts += s.service(&mut mac);
            if let Some(outcome) = s.confirm(1, MacStatus::NoAck) {
                break outcome;
            }
        };
        assert_eq!(attempts, 3); // max_frame_retries + 1
        assert_eq!(outcome.status, TxStatus::RetriesExhausted);
        assert!(s.pool().find_by_handle(1).is_none());
    }

    #[test]
    fn test_stale_confirm_discarded() {
        let mut s = sched();
        assert!(s.confirm(0x55, MacStatus::Success).is_none());

        // A confirm for a frame still Waiting is stale too.
        s.enqueue(frame(2, 0x20, TxOptions::default()), FrameKind::Direct)
            .unwrap();
        assert!(s.confirm(2, MacStatus::Success).is_none());
        assert_eq!(
            s.pool().find_by_handle(2).unwrap().state,
            FrameState::Waiting
        );
    }

    #[test]
    fn test_single_in_flight_per_destination() {
        let mut s = sched();
        let mut mac = MockMac::new();
        s.enqueue(frame(1, 0x10, TxOptions::default()), FrameKind::Direct)
            .unwrap();
        s.enqueue(frame(2, 0x10, TxOptions::default()), FrameKind::Direct)
            .unwrap();
        s.enqueue(frame(3, 0x30, TxOptions::default()), FrameKind::Direct)
            .unwrap();

        // Only one frame per destination may be in flight.
        assert_eq!(s.service(&mut mac), 2);
        assert_eq!(mac.transmits, vec![(ShortAddress(0x10), 1), (ShortAddress(0x30), 3)]);

        // Once handle 1 confirms, handle 2 becomes eligible.
        s.confirm(1, MacStatus::Success);
        assert_eq!(s.service(&mut mac), 1);
        assert_eq!(mac.transmits.last(), Some(&(ShortAddress(0x10), 2)));
    }

    #[test]
    fn test_hi_delay_serviced_before_delay() {
        let mut s = sched();
        let mut mac = MockMac::new();
        let delay = TxOptions {
            delay: true,
            ..Default::default()
        };
        let hi = TxOptions {
            hi_delay: true,
            ..Default::default()
        };
        s.enqueue(frame(1, 0x10, delay), FrameKind::Direct).unwrap();
        s.enqueue(frame(2, 0x20, hi), FrameKind::Direct).unwrap();

        s.service(&mut mac);
        // Handle 2 was enqueued later but goes out first.
        assert_eq!(mac.transmits[0], (ShortAddress(0x20), 2));
        assert_eq!(mac.transmits[1], (ShortAddress(0x10), 1));
    }

    #[test]
    fn test_broadcast_pacing() {
        let mut config = NwkConfig::default();
        config.broadcast_spacing = 2;
        let mut s = TransmitScheduler::new(config);
        let mut mac = MockMac::new();
        let bc = TxOptions {
            broadcast: true,
            ..Default::default()
        };
        let mut a = frame(1, 0xFFFF, bc);
        a.destination = ShortAddress::BROADCAST;
        let mut b = frame(2, 0xFFFF, bc);
        b.destination = ShortAddress::BROADCAST;
        s.enqueue(a, FrameKind::Broadcast).unwrap();
        s.enqueue(b, FrameKind::Broadcast).unwrap();

        // First broadcast goes out, second is paced.
        assert_eq!(s.service(&mut mac), 1);
        s.confirm(1, MacStatus::Success);
        assert_eq!(s.service(&mut mac), 0);

        s.tick();
        assert_eq!(s.service(&mut mac), 0);
        s.tick();
        assert_eq!(s.service(&mut mac), 1);
        assert_eq!(mac.transmits.last(), Some(&(ShortAddress::BROADCAST, 2)));
    }

    #[test]
    fn test_mac_busy_leaves_frame_waiting() {
        let mut s = sched();
        let mut mac = MockMac::new();
        mac.reject = Some(MacReject::Busy);
        s.enqueue(frame(1, 0x10, TxOptions::default()), FrameKind::Direct)
            .unwrap();

        assert_eq!(s.service(&mut mac), 0);
        assert_eq!(
            s.pool().find_by_handle(1).unwrap().state,
            FrameState::Waiting
        );

        mac.reject = None;
        assert_eq!(s.service(&mut mac), 1);
    }

    #[test]
    fn test_indirect_hold_released_by_poll() {
        let mut s = sched();
        let mut mac = MockMac::new();
        s.enqueue(frame(9, 0x44, TxOptions::default()), FrameKind::Indirect)
            .unwrap();
        assert_eq!(s.pool().find_by_handle(9).unwrap().state, FrameState::Hold);
        assert_eq!(s.service(&mut mac), 0);

        assert_eq!(s.destination_available(ShortAddress(0x44)), 1);
        assert_eq!(s.service(&mut mac), 1);
    }

    #[test]
    fn test_indirect_hold_expiry_reported() {
        let mut config = NwkConfig::default();
        config.indirect_hold_timeout = 2;
        let mut s = TransmitScheduler::new(config);
        s.enqueue(
            frame(9, 0x44, TxOptions::default()).with_user(FrameUser::Zdo { seq: 3 }),
            FrameKind::Indirect,
        )
        .unwrap();

        assert!(s.tick().is_empty());
        let outcomes = s.tick();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, TxStatus::HoldExpired);
        assert_eq!(outcomes[0].user, FrameUser::Zdo { seq: 3 });
        assert!(s.pool().is_empty());
    }
}
