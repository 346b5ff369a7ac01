//! Test doubles and helpers for the engine contract tests
//!
//! The controlled session lets a test feed telemetry messages into a running
//! engine; the mock pusher records every configuration write.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

use ifsync_core::config::{IfsyncConfig, SessionConfig};
use ifsync_core::engine::{Engine, EngineEvent};
use ifsync_core::error::Result;
use ifsync_core::traits::{ConfigPusher, LeafUpdate, TelemetryMessage, TelemetrySession};

/// A telemetry session the test drives by hand
pub struct ControlledSession {
    /// Receiver handed to the engine's subscription stream
    engine_rx: Mutex<Option<mpsc::UnboundedReceiver<Result<TelemetryMessage>>>>,
}

impl ControlledSession {
    /// Create a session and the sender used to feed it
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<TelemetryMessage>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            engine_rx: Mutex::new(Some(rx)),
        };
        (session, tx)
    }
}

impl TelemetrySession for ControlledSession {
    fn subscribe(
        &self,
        _paths: &[&str],
    ) -> Pin<Box<dyn Stream<Item = Result<TelemetryMessage>> + Send + 'static>> {
        let rx = self
            .engine_rx
            .lock()
            .unwrap()
            .take()
            .expect("subscribe() can only be called once");
        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

/// A pusher that records configuration writes instead of making them
pub struct MockPusher {
    call_count: Arc<AtomicUsize>,
    pushes: Arc<Mutex<Vec<(String, String, u8)>>>,
    fail: bool,
}

impl MockPusher {
    pub fn new() -> Self {
        Self {
            call_count: Arc::new(AtomicUsize::new(0)),
            pushes: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A pusher whose writes all fail
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Create a MockPusher that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            call_count: Arc::clone(&other.call_count),
            pushes: Arc::clone(&other.pushes),
            fail: other.fail,
        }
    }

    /// Number of times set_address() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every recorded (interface, address, prefix_len) write
    pub fn pushes(&self) -> Vec<(String, String, u8)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ConfigPusher for MockPusher {
    async fn set_address(&self, interface: &str, address: &str, prefix_len: u8) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.pushes.lock().unwrap().push((
            interface.to_string(),
            address.to_string(),
            prefix_len,
        ));

        if self.fail {
            return Err(ifsync_core::Error::push("device unreachable"));
        }
        Ok(())
    }

    fn pusher_name(&self) -> &'static str {
        "mock"
    }
}

/// Engine configuration with a short grace period for tests
pub fn test_config(pool_size: usize, prefix_len: u8, grace_period_ms: u64) -> IfsyncConfig {
    let mut config = IfsyncConfig::new(SessionConfig {
        addr: "test:0".to_string(),
        ..SessionConfig::default()
    });
    config.pool.size = pool_size;
    config.pool.prefix_len = prefix_len;
    config.engine.grace_period_ms = grace_period_ms;
    config
}

/// A running engine plus the handles a test needs to drive and observe it
pub struct EngineHarness {
    /// Feeds telemetry messages into the subscription stream
    pub feed: mpsc::UnboundedSender<Result<TelemetryMessage>>,
    /// Engine monitoring events
    pub events: mpsc::Receiver<EngineEvent>,
    /// Ends the run loop cleanly when sent
    pub shutdown: oneshot::Sender<()>,
    /// Resolves to the run loop's result
    pub handle: tokio::task::JoinHandle<Result<()>>,
}

/// Spawn an engine over a controlled session and the given pusher
///
/// Keep a probe made with [`MockPusher::sharing_counters_with`] before
/// calling this; the pusher itself moves into the engine.
pub fn start_engine(pusher: MockPusher, config: IfsyncConfig) -> EngineHarness {
    let (session, feed) = ControlledSession::new();
    let (mut engine, events) =
        Engine::new(Box::new(session), Box::new(pusher), config).expect("engine construction");
    let (shutdown, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    EngineHarness {
        feed,
        events,
        shutdown,
        handle,
    }
}

/// Receive engine events until `pred` matches one, or panic after two
/// seconds
pub async fn wait_for_event<F>(events: &mut mpsc::Receiver<EngineEvent>, mut pred: F) -> EngineEvent
where
    F: FnMut(&EngineEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("engine event channel closed while waiting"),
            }
        }
    })
    .await
    .expect("timed out waiting for engine event")
}

/// An admin-status notification batch for `interface`
pub fn admin_status(interface: &str, value: &str) -> TelemetryMessage {
    TelemetryMessage::Updates {
        prefix: format!("/interfaces/interface[name={interface}]"),
        updates: vec![LeafUpdate::new("state/admin-status", value)],
    }
}

/// An address-state notification batch carrying the given leaves
///
/// Mirrors the transport's shape: both address leaves share the address
/// container prefix.
pub fn address_state(interface: &str, address: &str, leaves: &[(&str, &str)]) -> TelemetryMessage {
    TelemetryMessage::Updates {
        prefix: format!(
            "/interfaces/interface[name={interface}]/subinterfaces/subinterface[index=0]\
             /ipv4/addresses/address[ip={address}]/state"
        ),
        updates: leaves
            .iter()
            .map(|(path, value)| LeafUpdate::new(*path, *value))
            .collect(),
    }
}
