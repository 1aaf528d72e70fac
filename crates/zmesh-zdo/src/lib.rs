//! zmesh Device-Object Discovery Cache
//!
//! A discovery cache lets low-power devices park their descriptor set on a
//! better-resourced neighbor instead of answering (or broadcasting)
//! descriptor queries themselves. This crate implements both roles:
//!
//! - [`CacheServer`]: a bounded table of remote devices' descriptors,
//!   populated by store requests, queried by find/management requests, and
//!   aged out by a periodic tick.
//! - [`CacheClient`]: the end-device side, a linear, retryable
//!   request/response sequence that discovers a cache server and uploads
//!   the local descriptor set, then goes quiet to conserve power.
//!
//! Both roles are always compiled; a device instantiates exactly one.

mod cache;
mod client;
mod descriptors;
mod status;

pub use cache::*;
pub use client::*;
pub use descriptors::*;
pub use status::*;
