//! zmesh Monitor-Test command router
//!
//! A host drives the mesh stack over a framed serial link. Requests come
//! in as checksummed envelopes (see `zmesh-wire`), get decoded into typed
//! commands, and are dispatched to per-subsystem handlers backed by the
//! network scheduler (`zmesh-nwk`) and the discovery cache (`zmesh-zdo`).
//! Each request is answered by at most one response envelope; transmit
//! confirms and reset indications flow back as unsolicited callbacks.
//!
//! The router talks to its environment only through collaborator traits:
//! [`MacDriver`](zmesh_nwk::MacDriver) for the radio, [`Transport`] for
//! the serial link, and [`NvStore`] for configuration persistence. Hosts
//! feed raw bytes to [`MtRouter::receive`] and drive time with
//! [`MtRouter::tick`].

mod commands;
mod error;
mod ids;
mod responses;
mod router;

pub use commands::*;
pub use error::*;
pub use ids::*;
pub use responses::*;
pub use router::*;
