//! Per-interface state machine
//!
//! One [`Interface`] record exists per interface name, created lazily on
//! first event and never destroyed. Configuration fragments for an interface
//! arrive independently and in no guaranteed order, so the machine collects
//! them and decides the final configuration once the set is complete or the
//! grace period runs out.
//!
//! All transitions run on the engine's single event-loop task. The grace
//! timer never touches the record directly: the spawned timer task sends the
//! interface name back into the loop, where it is handled as an ordinary
//! queued event. An aborted or stale timer message is discarded by the state
//! guard on delivery.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::classify::{Event, EventKind};
use crate::engine::EngineEvent;
use crate::pool::AddressPool;
use crate::traits::ConfigPusher;

/// State machine states, ordered
///
/// The ordering is load-bearing for exactly one guard: an admin-status "UP"
/// is ignored unless `state <= AdminDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterfaceState {
    /// No admin status observed yet
    Unknown,
    /// Administratively down; holds no address
    AdminDown,
    /// Administratively up, waiting for fragments or the grace timer
    AdminUp,
    /// Final configuration decided (and pushed if it differed)
    Configured,
}

impl InterfaceState {
    /// Human-readable state name for logs
    pub fn name(self) -> &'static str {
        match self {
            InterfaceState::Unknown => "unknown",
            InterfaceState::AdminDown => "admin-down",
            InterfaceState::AdminUp => "admin-up",
            InterfaceState::Configured => "configured",
        }
    }
}

/// Collaborators a transition may touch
///
/// Borrowed from the engine for the duration of one dispatch; the record
/// itself never holds references to shared state.
pub struct TransitionCtx<'a> {
    /// The process-wide address pool
    pub pool: &'a mut AddressPool,
    /// Device configuration writer
    pub pusher: &'a dyn ConfigPusher,
    /// Channel feeding timer expiries back into the event loop
    pub timer_tx: &'a mpsc::Sender<String>,
    /// Grace period for incomplete fragment sets
    pub grace_period: Duration,
    /// Monitoring event sink
    pub events: &'a mpsc::Sender<EngineEvent>,
}

impl TransitionCtx<'_> {
    fn emit(&self, event: EngineEvent) {
        if self.events.try_send(event).is_err() {
            warn!("engine event channel full, dropping event");
        }
    }
}

/// Per-interface record: state, collected fragments, pending timer
///
/// Mutated exclusively through [`Interface::handle_event`].
#[derive(Debug)]
pub struct Interface {
    name: String,
    state: InterfaceState,
    address: Option<String>,
    prefix_len: Option<u8>,
    timer: Option<JoinHandle<()>>,
    /// Set when a fragment observed in Configured state diverged from the
    /// recorded configuration; cleared when the debounce timer re-evaluates.
    reconfigure_pending: bool,
    /// The assignment last confirmed for this interface (pushed with
    /// success, or found in place by a matched reconciliation). Cleared on
    /// AdminDown; never set by a failed push.
    applied: Option<(String, u8)>,
}

impl Interface {
    /// Create a record for `name` in the Unknown state
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: InterfaceState::Unknown,
            address: None,
            prefix_len: None,
            timer: None,
            reconfigure_pending: false,
            applied: None,
        }
    }

    /// Current state
    pub fn state(&self) -> InterfaceState {
        self.state
    }

    /// True once both a non-empty address and a positive prefix length have
    /// been collected
    fn fragments_complete(&self) -> bool {
        self.address.as_deref().is_some_and(|a| !a.is_empty())
            && self.prefix_len.is_some_and(|p| p > 0)
    }

    /// Dispatch one event to this record
    pub async fn handle_event(&mut self, event: &Event, ctx: &mut TransitionCtx<'_>) {
        let value = event.value.as_deref().unwrap_or_default();
        debug!(
            interface = self.name.as_str(),
            state = self.state.name(),
            kind = ?event.kind,
            value,
            "handling event"
        );

        match event.kind {
            EventKind::AdminStatus => self.handle_admin_status(value, ctx).await,
            EventKind::Address => self.handle_address(value, ctx).await,
            EventKind::PrefixLength => self.handle_prefix_length(value, ctx).await,
            EventKind::Timer => self.handle_timer(ctx).await,
            EventKind::Unknown => {
                warn!(interface = self.name.as_str(), "dropping unknown event");
            }
        }

        debug!(
            interface = self.name.as_str(),
            state = self.state.name(),
            "event handled"
        );
    }

    async fn handle_admin_status(&mut self, value: &str, ctx: &mut TransitionCtx<'_>) {
        match value {
            "UP" => {
                // Repeated "UP" sightings above AdminDown are the stream
                // re-delivering current state; nothing to do.
                if self.state > InterfaceState::AdminDown {
                    return;
                }

                self.enter_admin_up(ctx);

                if self.fragments_complete() {
                    self.enter_configured(ctx).await;
                }
            }
            "DOWN" => self.enter_admin_down(ctx),
            other => {
                error!(interface = self.name.as_str(), value = other, "unknown admin status");
            }
        }
    }

    async fn handle_address(&mut self, value: &str, ctx: &mut TransitionCtx<'_>) {
        let changed = self.address.as_deref() != Some(value);
        self.address = Some(value.to_string());

        match self.state {
            InterfaceState::AdminUp => {
                if self.fragments_complete() {
                    self.enter_configured(ctx).await;
                }
            }
            InterfaceState::Configured if changed => self.mark_reconfigure_pending(ctx),
            _ => {}
        }
    }

    async fn handle_prefix_length(&mut self, value: &str, ctx: &mut TransitionCtx<'_>) {
        let prefix_len: u8 = match value.parse() {
            Ok(v) => v,
            Err(_) => {
                // Field stays unchanged; no transition, no crash.
                error!(interface = self.name.as_str(), value, "invalid prefix length");
                return;
            }
        };

        let changed = self.prefix_len != Some(prefix_len);
        self.prefix_len = Some(prefix_len);

        match self.state {
            InterfaceState::AdminUp => {
                if self.fragments_complete() {
                    self.enter_configured(ctx).await;
                }
            }
            InterfaceState::Configured if changed => self.mark_reconfigure_pending(ctx),
            _ => {}
        }
    }

    async fn handle_timer(&mut self, ctx: &mut TransitionCtx<'_>) {
        match self.state {
            InterfaceState::AdminUp => {
                self.timer = None;
                self.enter_configured(ctx).await;
            }
            InterfaceState::Configured if self.reconfigure_pending => {
                self.timer = None;
                self.reconfigure_pending = false;
                self.enter_configured(ctx).await;
            }
            // A timer message that raced an admin-down (or a duplicate) is
            // stale; drop it.
            _ => {}
        }
    }

    /// AdminDown entry: cancel the timer, release the held address
    ///
    /// The recorded address may be stale; releasing an address the pool does
    /// not know about is a no-op.
    fn enter_admin_down(&mut self, ctx: &mut TransitionCtx<'_>) {
        self.state = InterfaceState::AdminDown;
        self.reconfigure_pending = false;
        self.applied = None;

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        // Report what the release actually unbound; a stale recorded address
        // may be held by another interface by now.
        let released = self
            .address
            .as_deref()
            .and_then(|address| ctx.pool.release(address))
            .map(|(_, address)| address);

        ctx.emit(EngineEvent::AdminDown {
            interface: self.name.clone(),
            released,
        });
    }

    /// AdminUp entry: arm the grace timer if fragments are still missing
    ///
    /// The machine cannot know whether an address will ever be streamed for
    /// this interface; absence of a fragment only becomes meaningful after
    /// waiting.
    fn enter_admin_up(&mut self, ctx: &mut TransitionCtx<'_>) {
        self.state = InterfaceState::AdminUp;

        if !self.fragments_complete() {
            self.arm_timer(ctx);
        }
    }

    fn arm_timer(&mut self, ctx: &TransitionCtx<'_>) {
        if self.timer.is_some() {
            return;
        }

        let name = self.name.clone();
        let grace = ctx.grace_period;
        let tx = ctx.timer_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            // The send only fails when the event loop is gone.
            let _ = tx.send(name).await;
        }));
    }

    fn mark_reconfigure_pending(&mut self, ctx: &TransitionCtx<'_>) {
        self.reconfigure_pending = true;
        // One re-evaluation per grace window, however much the value churns.
        self.arm_timer(ctx);
    }

    /// Configured entry: reconcile or allocate, push when the device needs
    /// the change
    async fn enter_configured(&mut self, ctx: &mut TransitionCtx<'_>) {
        // A re-entry can only come from the debounce timer; the "UP" guard
        // keeps admin-status events from landing here while Configured.
        let reentry = self.state == InterfaceState::Configured;
        self.state = InterfaceState::Configured;

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let collected = match (self.address.clone(), self.prefix_len) {
            (Some(address), Some(prefix_len)) if !address.is_empty() && prefix_len > 0 => {
                Some((address, prefix_len))
            }
            _ => None,
        };

        let outcome = match collected {
            Some((address, prefix_len)) => {
                match ctx.pool.reconcile(&self.name, &address, prefix_len) {
                    Ok(r) if r.matched => {
                        debug!(
                            interface = self.name.as_str(),
                            address = r.address.as_str(),
                            prefix_len = r.prefix_len,
                            "reconciled, keeping current configuration"
                        );
                        self.address = Some(r.address.clone());
                        self.prefix_len = Some(r.prefix_len);
                        self.applied = Some((r.address.clone(), r.prefix_len));
                        ctx.emit(EngineEvent::Configured {
                            interface: self.name.clone(),
                            address: r.address,
                            prefix_len: r.prefix_len,
                            pushed: false,
                        });
                        return;
                    }
                    Ok(r) => Ok((r.address, r.prefix_len)),
                    Err(e) => Err(e),
                }
            }
            None => ctx.pool.allocate(&self.name),
        };

        let (address, prefix_len) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                // Degraded: no address to configure. The record stays in
                // Configured with no recorded assignment; a later release
                // frees capacity for the next cycle.
                error!(interface = self.name.as_str(), error = %e, "allocation failed");
                ctx.emit(EngineEvent::PoolExhausted {
                    interface: self.name.clone(),
                });
                return;
            }
        };

        self.address = Some(address.clone());
        self.prefix_len = Some(prefix_len);

        // A debounce re-evaluation that resolved back to the assignment
        // already in place is a superseded or re-delivered sighting, not
        // drift; re-pushing it would make duplicate delivery non-idempotent.
        if reentry && self.applied.as_ref() == Some(&(address.clone(), prefix_len)) {
            debug!(
                interface = self.name.as_str(),
                address = address.as_str(),
                prefix_len,
                "re-evaluation kept the applied assignment, no push"
            );
            return;
        }

        debug!(
            interface = self.name.as_str(),
            address = address.as_str(),
            prefix_len,
            "setting interface address"
        );

        // Failures are logged and not retried here; the next stream
        // notification reflecting true device state corrects the drift.
        match ctx.pusher.set_address(&self.name, &address, prefix_len).await {
            Ok(()) => {
                // Only a confirmed write counts as applied; after a failed
                // push the next re-evaluation must stay free to retry.
                self.applied = Some((address.clone(), prefix_len));
                ctx.emit(EngineEvent::Configured {
                    interface: self.name.clone(),
                    address,
                    prefix_len,
                    pushed: true,
                });
            }
            Err(e) => {
                error!(
                    interface = self.name.as_str(),
                    address = address.as_str(),
                    prefix_len,
                    error = %e,
                    "failed to set interface address"
                );
                ctx.emit(EngineEvent::PushFailed {
                    interface: self.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
}
