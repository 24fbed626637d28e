//! Model Descriptor codec and Port protocol for the LP/Monte Carlo solver
//! process.
//!
//! This crate owns the two wire formats the engine speaks to the outside
//! world:
//!
//! - [`codec`]: the binary [`engine_core::ModelDescriptor`] layout (§4.1) —
//!   the payload format.
//! - [`port`]: the length-prefixed framing (§6.2) a [`ModelDescriptor`]
//!   payload travels in when the solver runs as a subprocess rather than
//!   in-process.
//!
//! # Protocol version
//!
//! Breaking changes to either format increment [`PROTOCOL_VERSION`].

pub mod codec;
pub mod error;
pub mod port;

pub use error::{ExitCode, WireError, WireResult};

/// Protocol version for wire-format compatibility checking.
pub const PROTOCOL_VERSION: u8 = 1;
