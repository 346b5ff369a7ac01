// # Config Pusher Trait
//
// Defines the interface for pushing an address configuration to the device.
//
// ## Responsibility boundary
//
// Pushers execute exactly one configuration write per call and report
// success or failure. Everything else is owned elsewhere:
//
// - Deciding whether a push is needed (reconciliation): engine
// - Reacting to a failed push: engine (logged, not retried; the next
//   stream notification corrects the drift)
// - Address selection: address pool
//
// A pusher that retries, sleeps, or caches state breaks the engine's
// one-push-per-transition accounting.

use async_trait::async_trait;

/// Trait for configuration push implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait ConfigPusher: Send + Sync {
    /// Set the interface's address and prefix length on the device
    ///
    /// Must be idempotent: writing a value the device already carries is
    /// safe and reports success.
    async fn set_address(
        &self,
        interface: &str,
        address: &str,
        prefix_len: u8,
    ) -> Result<(), crate::Error>;

    /// Name of the pusher (for logging/debugging)
    fn pusher_name(&self) -> &'static str;
}
