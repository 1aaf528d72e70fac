//! zmesh Serial Wire Protocol
//!
//! This crate provides the byte-level building blocks shared by every layer
//! of the zmesh stack: the command envelope framing used on the serial
//! transport, the bounded byte cursor used to build and parse payloads, and
//! the mesh address primitives.
//!
//! # Framing Overview
//!
//! Every message on the serial transport is a single envelope:
//!
//! ```text
//! +------+--------+--------+-----+-----------------+-----+
//! | SOP  | cmd_hi | cmd_lo | len | payload[0..len] | fcs |
//! +------+--------+--------+-----+-----------------+-----+
//! ```
//!
//! where `fcs` is the XOR of every byte from `cmd_hi` through the end of the
//! payload. The 16-bit command id is partitioned by high bits:
//!
//! - **Requests** (host → stack): plain command id
//! - **Responses** (stack → host): request id with [`RESPONSE_BIT`] set
//! - **Callbacks** (stack → host, unsolicited): ids with [`CALLBACK_BIT`] set
//!
//! # Example
//!
//! ```rust
//! use zmesh_wire::Envelope;
//!
//! let env = Envelope::new(0x0007, Vec::new());
//! let bytes = env.encode();
//! let back = Envelope::decode(&bytes).unwrap();
//! assert_eq!(back.command_id, 0x0007);
//! ```

mod cursor;
mod envelope;
mod error;
mod types;

pub use cursor::*;
pub use envelope::*;
pub use error::*;
pub use types::*;
