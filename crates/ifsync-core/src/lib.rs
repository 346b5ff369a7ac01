// # ifsync-core
//
// Core library for the event-driven interface IP configurator.
//
// ## Architecture Overview
//
// This library keeps device interface IP configuration consistent with an
// address-assignment pool by reacting to a stream of state notifications:
//
// - **TelemetrySession**: Trait for subscribing to interface state updates
// - **ConfigPusher**: Trait for writing configuration to the device
// - **classify**: Path → typed event classification
// - **AddressPool**: Allocation pool with reconcile/release
// - **Interface**: Per-interface reactive state machine
// - **Engine**: Event loop routing classified events to the machines
//
// ## Design Principles
//
// 1. **Event-Driven**: No polling; the stream delivers current state
// 2. **Idempotent**: Repeated or late delivery of a leaf's value never
//    produces incorrect configuration
// 3. **Single-Writer**: All state mutation happens on the engine task; the
//    grace timer feeds back through a channel instead of sharing memory
// 4. **Library-First**: The engine runs against any session/pusher pair, so
//    single state machines are testable without a live stream

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod machine;
pub mod pool;
pub mod traits;

// Re-export core types for convenience
pub use classify::{classify, Event, EventKind, SUBSCRIBE_PATHS};
pub use config::{EngineConfig, IfsyncConfig, PoolConfig, SessionConfig};
pub use engine::{Engine, EngineEvent};
pub use error::{Error, Result};
pub use machine::{Interface, InterfaceState, TransitionCtx};
pub use pool::{AddressPool, Reconciliation};
pub use traits::{ConfigPusher, LeafUpdate, TelemetryMessage, TelemetrySession};
