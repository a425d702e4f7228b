//! Domain layer for the log trace bridge.
//!
//! Holds the types every other layer shares. The data types that flow through
//! the bridge (trace contexts, legacy events, telemetry records) live next to the
//! component that owns them; this module keeps the cross-cutting error type.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases

pub mod error;

pub use error::{BridgeError, Result};
