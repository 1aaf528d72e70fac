//! zmesh Network Layer Data-Buffer Engine
//!
//! This crate owns every outbound network frame between the moment a
//! protocol handler requests transmission and the moment the MAC driver
//! confirms (or permanently fails) delivery:
//!
//! - [`FrameBufferPool`]: a fixed-capacity arena of [`FrameRecord`]s, keyed
//!   by the caller-chosen 8-bit handle. The pool is the sole owner of frame
//!   payload memory; a record (and its payload) is dropped exactly once, on
//!   the single release path.
//! - [`TransmitScheduler`]: advances each record through its state machine
//!   (`Init → Waiting → Scheduled → Sent → Confirmed → Done`, with `Hold`
//!   for frames parked for a sleeping destination), hands frames to the
//!   external [`MacDriver`], and turns MAC confirms into retries or final
//!   outcomes.
//!
//! Everything here runs to completion inside a single cooperative task;
//! there is no locking and no interior mutability.

mod error;
mod pool;
mod record;
mod scheduler;

pub use error::*;
pub use pool::*;
pub use record::*;
pub use scheduler::*;
