//! Core event loop
//!
//! The engine is responsible for:
//! - Consuming the telemetry subscription stream
//! - Classifying each leaf update into a typed event
//! - Routing events to the per-interface state machine, creating records on
//!   first sight
//! - Handling session-level conditions (server error, end-of-initial-sync)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐                      ┌──────────────┐
//! │ TelemetrySession │── TelemetryMessage ──▶│    Engine    │◀── timer channel
//! └──────────────────┘                      └──────────────┘
//!                                                  │ dispatch
//!                                                  ▼
//!                                        ┌──────────────────┐
//!                                        │ Interface record │── AddressPool
//!                                        └──────────────────┘
//!                                                  │ on change
//!                                                  ▼
//!                                          ┌──────────────┐
//!                                          │ ConfigPusher │
//!                                          └──────────────┘
//! ```
//!
//! The engine holds no long-lived per-interface state itself; all truth
//! lives in the interface records it owns by name. Leaf updates within one
//! batch are dispatched in delivery order; there is no cross-interface
//! ordering guarantee and none is needed.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use tracing::{debug, info, warn};

use crate::classify::{classify, Event, EventKind, SUBSCRIBE_PATHS};
use crate::config::IfsyncConfig;
use crate::error::{Error, Result};
use crate::machine::{Interface, TransitionCtx};
use crate::pool::AddressPool;
use crate::traits::{ConfigPusher, TelemetryMessage, TelemetrySession};

/// Events emitted by the engine for monitoring/logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started and subscribed
    Started,

    /// Initial snapshot fully streamed
    SyncComplete,

    /// An interface went administratively down; `released` names the pool
    /// address the release actually unbound, if any
    AdminDown {
        interface: String,
        released: Option<String>,
    },

    /// An interface reached its final configuration; `pushed` is false when
    /// reconciliation matched and the device was left untouched
    Configured {
        interface: String,
        address: String,
        prefix_len: u8,
        pushed: bool,
    },

    /// A configuration push failed (logged, not retried)
    PushFailed { interface: String, error: String },

    /// Allocation failed because the pool is exhausted
    PoolExhausted { interface: String },

    /// Engine stopped
    Stopped { reason: String },
}

/// The event loop tying session, classifier, state machines, and pool
/// together
///
/// ## Lifecycle
///
/// 1. Create with [`Engine::new()`]
/// 2. Start with [`Engine::run()`]
/// 3. The loop exits on session failure (fatal, propagated) or shutdown
///
/// ## Threading
///
/// All state mutation happens on the single task that runs the loop. Grace
/// timers are spawned tasks that report expiry back through an mpsc channel,
/// so Timer is just another queued event and the records need no locks.
pub struct Engine {
    /// Telemetry subscription collaborator
    session: Box<dyn TelemetrySession>,

    /// Device configuration writer
    pusher: Box<dyn ConfigPusher>,

    /// Process-wide address pool
    pool: AddressPool,

    /// Interface records, keyed by name, created lazily
    interfaces: HashMap<String, Interface>,

    /// Grace period for incomplete fragment sets
    grace_period: std::time::Duration,

    /// Monitoring event sink
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Engine {
    /// Create a new engine
    ///
    /// Returns the engine and a receiver yielding [`EngineEvent`]s for
    /// external monitoring.
    pub fn new(
        session: Box<dyn TelemetrySession>,
        pusher: Box<dyn ConfigPusher>,
        config: IfsyncConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            session,
            pusher,
            pool: AddressPool::new(config.pool.size, config.pool.prefix_len),
            interfaces: HashMap::new(),
            grace_period: config.engine.grace_period(),
            event_tx,
        };

        Ok((engine, event_rx))
    }

    /// Run the event loop until session failure or shutdown signal
    ///
    /// # Returns
    ///
    /// - `Ok(())`: clean shutdown (Ctrl-C)
    /// - `Err(Error::Session(..))`: fatal session condition; the loop never
    ///   reconnects on its own
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Test-only helper to run the engine with a controlled shutdown signal
    ///
    /// Production code should use [`Engine::run()`], which shuts down on OS
    /// signals instead of a programmatic channel.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let mut stream = self.session.subscribe(SUBSCRIBE_PATHS);

        // Timer expiries flow back into the loop through this channel, so
        // every transition runs on this task.
        let (timer_tx, mut timer_rx) = mpsc::channel::<String>(64);

        self.emit(EngineEvent::Started);
        info!(
            pool_size = self.pool.size(),
            prefix_len = self.pool.prefix_len(),
            pusher = self.pusher.pusher_name(),
            "engine started"
        );

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    msg = stream.next() => {
                        self.handle_message(msg, &timer_tx).await?;
                    }

                    Some(interface) = timer_rx.recv() => {
                        self.dispatch(Event::timer(interface), &timer_tx).await;
                    }

                    _ = &mut rx => {
                        info!("shutdown signal received");
                        self.emit(EngineEvent::Stopped {
                            reason: "shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    msg = stream.next() => {
                        self.handle_message(msg, &timer_tx).await?;
                    }

                    Some(interface) = timer_rx.recv() => {
                        self.dispatch(Event::timer(interface), &timer_tx).await;
                    }

                    _ = tokio::signal::ctrl_c() => {
                        info!("shutdown signal received");
                        self.emit(EngineEvent::Stopped {
                            reason: "shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle one message from the subscription stream
    ///
    /// Session-level failures come back as `Err` and end the loop.
    async fn handle_message(
        &mut self,
        msg: Option<Result<TelemetryMessage>>,
        timer_tx: &mpsc::Sender<String>,
    ) -> Result<()> {
        match msg {
            None => Err(Error::session("telemetry stream ended")),
            Some(Err(e)) => Err(e),
            Some(Ok(TelemetryMessage::SyncComplete(false))) => {
                Err(Error::session("initial sync failed"))
            }
            Some(Ok(TelemetryMessage::SyncComplete(true))) => {
                // End of the initial snapshot. Nothing differentiates initial
                // state from ongoing updates downstream of here.
                debug!("initial sync complete");
                self.emit(EngineEvent::SyncComplete);
                Ok(())
            }
            Some(Ok(TelemetryMessage::Updates { prefix, updates })) => {
                for leaf in updates {
                    let path = join_path(&prefix, &leaf.path);
                    debug!(path = path.as_str(), value = leaf.value.as_str(), "received update");

                    let event = classify(&path, &leaf.value);
                    if event.kind == EventKind::Unknown {
                        warn!(path = path.as_str(), "unrecognized path, dropping update");
                        continue;
                    }

                    self.dispatch(event, timer_tx).await;
                }
                Ok(())
            }
        }
    }

    /// Route an event to the addressed interface's record, creating it on
    /// first reference
    async fn dispatch(&mut self, event: Event, timer_tx: &mpsc::Sender<String>) {
        let Some(name) = event.interface.clone() else {
            warn!(kind = ?event.kind, "dropping event without interface");
            return;
        };

        let record = self
            .interfaces
            .entry(name.clone())
            .or_insert_with(|| Interface::new(name));

        let mut ctx = TransitionCtx {
            pool: &mut self.pool,
            pusher: self.pusher.as_ref(),
            timer_tx,
            grace_period: self.grace_period,
            events: &self.event_tx,
        };

        record.handle_event(&event, &mut ctx).await;
    }

    fn emit(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("engine event channel full, dropping event");
        }
    }
}

/// Build the absolute leaf path from the batch prefix
fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    if path.is_empty() {
        return prefix.to_string();
    }
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
