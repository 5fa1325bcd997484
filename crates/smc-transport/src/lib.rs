//! smc-transport: key and register access to Apple SMC/PMU controllers
//!
//! This crate provides the traits and types through which sensor and clock drivers talk to
//! the system-management controller (key/value access) and the power-management unit
//! (byte-addressed register access). Framing and bus enumeration live behind these traits.
//! The default build enables a `mock` backend so that drivers can be exercised on any host.

mod types;
pub use types::{KeyType, RegmapConfig, SmcKey};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::{RegisterBus, SmcBus};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockPmu, MockSmc};
