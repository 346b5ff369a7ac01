// # Telemetry Session Trait
//
// Defines the interface for subscribing to interface state notifications.
//
// ## Contract
//
// - Notifications are delivered as batches of leaf updates sharing a common
//   path prefix.
// - Values are pre-decoded to string form regardless of wire encoding.
// - The stream delivers current state, not discrete events: the same leaf's
//   value may arrive multiple times, and consumers must be idempotent.
// - A `SyncComplete(true)` message marks the end of the initial snapshot;
//   `SyncComplete(false)` means the initial sync failed.
// - A server-side error payload or stream termination surfaces as a stream
//   `Err`/end and is fatal to the session. Reconnection is the caller's
//   concern, never the session's.

use std::pin::Pin;

use tokio_stream::Stream;

/// One updated leaf within a notification batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafUpdate {
    /// Path of the leaf, relative to the batch prefix
    pub path: String,
    /// The leaf's current value, decoded to a string
    pub value: String,
}

impl LeafUpdate {
    /// Create a leaf update
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// A message delivered over the subscription stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryMessage {
    /// A batch of leaf updates sharing a common path prefix
    Updates {
        /// Common path prefix for all updates in the batch
        prefix: String,
        /// The updated leaves, in delivery order
        updates: Vec<LeafUpdate>,
    },

    /// Initial-sync marker; `false` means the initial sync failed
    SyncComplete(bool),
}

/// Trait for telemetry session implementations
///
/// Implementations establish a session with the telemetry source and yield
/// an unbounded sequence of notifications for the subscribed paths.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks. If a
/// background task is spawned to drive the transport, it must be
/// event-driven and cancellation-safe: dropping the stream cleans it up.
pub trait TelemetrySession: Send + Sync {
    /// Subscribe to the given path patterns
    ///
    /// Returns a stream of telemetry messages. The first `Err` item is a
    /// fatal session error; the stream ending is equivalent to one.
    fn subscribe(
        &self,
        paths: &[&str],
    ) -> Pin<Box<dyn Stream<Item = crate::Result<TelemetryMessage>> + Send + 'static>>;
}
