//! Telemetry path classification
//!
//! Turns a slash-delimited notification path into a typed [`Event`] by
//! matching it against a fixed table of leaf patterns and extracting the
//! interface name. The patterns are mutually exclusive, so match order
//! does not matter.

use std::sync::LazyLock;

use regex::Regex;

/// The paths the engine subscribes to.
///
/// The admin-status leaf carries "UP" or "DOWN"; the address state container
/// has two leaves, one for the address itself and one for the prefix length.
pub const SUBSCRIBE_PATHS: &[&str] = &[
    "/interfaces/interface/state/admin-status",
    "/interfaces/interface/subinterfaces/subinterface/ipv4/addresses/address/state",
];

// Matches on the interface name of an admin-status leaf path.
static RE_ADMIN_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/interfaces/interface\[name=(Ethernet[^\]]*)\]/state/admin-status")
        .expect("admin-status pattern")
});

// Matches on the interface name of an address leaf path.
static RE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/interfaces/interface\[name=(Ethernet[^\]]*)\]/.*/address\[ip=[^\]]*\]/state/ip$")
        .expect("address pattern")
});

// Matches on the interface name of a prefix-length leaf path.
static RE_PREFIX_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"/interfaces/interface\[name=(Ethernet[^\]]*)\]/.*/address\[ip=[^\]]*\]/state/prefix-length",
    )
    .expect("prefix-length pattern")
});

/// Kinds of events the state machine deals with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Administrative status fragment ("UP"/"DOWN")
    AdminStatus,
    /// Assigned address fragment
    Address,
    /// Prefix length fragment
    PrefixLength,
    /// Grace timer expiry, synthesized internally
    Timer,
    /// Path matched no known leaf pattern
    Unknown,
}

/// One event, constructed once per notification and never mutated
#[derive(Debug, Clone)]
pub struct Event {
    /// What kind of fragment (or internal signal) this is
    pub kind: EventKind,
    /// Interface the event addresses; `None` for unclassifiable paths
    pub interface: Option<String>,
    /// Raw string payload from the stream; `None` for timer events
    pub value: Option<String>,
}

impl Event {
    /// Synthesize a grace-timer event for an interface
    pub fn timer(interface: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Timer,
            interface: Some(interface.into()),
            value: None,
        }
    }

    fn unknown() -> Self {
        Self {
            kind: EventKind::Unknown,
            interface: None,
            value: None,
        }
    }
}

/// Classify a notification path into an event
///
/// Returns an event of kind [`EventKind::Unknown`] with no interface name
/// when no pattern matches; callers must treat that as a no-op. No side
/// effects.
pub fn classify(path: &str, value: &str) -> Event {
    let table = [
        (EventKind::AdminStatus, &*RE_ADMIN_STATUS),
        (EventKind::Address, &*RE_ADDRESS),
        (EventKind::PrefixLength, &*RE_PREFIX_LENGTH),
    ];

    for (kind, re) in table {
        if let Some(groups) = re.captures(path) {
            return Event {
                kind,
                interface: groups.get(1).map(|m| m.as_str().to_string()),
                value: Some(value.to_string()),
            };
        }
    }

    Event::unknown()
}
