//! Core traits for the interface configurator
//!
//! This module defines the abstract interfaces the external collaborators
//! must follow.
//!
//! - [`TelemetrySession`]: Subscribe to interface state notifications
//! - [`ConfigPusher`]: Push an address configuration to the device

pub mod pusher;
pub mod session;

pub use pusher::ConfigPusher;
pub use session::{LeafUpdate, TelemetryMessage, TelemetrySession};
