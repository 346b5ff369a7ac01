//! Address allocation pool
//!
//! A fixed-size pool of synthetic addresses with a single shared prefix
//! length. The assignment map is the sole source of truth: `allocate` and
//! `reconcile` can never bind two interfaces to the same address.
//!
//! The pool is owned by the engine and only touched from within the event
//! loop, so it carries no synchronization of its own. A multi-writer
//! deployment (e.g. sharding across processes) would need to add it.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};

/// Outcome of [`AddressPool::reconcile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The address now bound to the interface
    pub address: String,
    /// The pool's prefix length
    pub prefix_len: u8,
    /// Whether the given address/prefix pair was already consistent with the
    /// pool, i.e. the interface does not need to be reconfigured
    pub matched: bool,
}

/// A fixed pool of addresses with an assigned-to mapping
///
/// Initialized once at startup with `n` synthetic addresses of the form
/// `10.0.<i>.1` and never resized afterward.
#[derive(Debug)]
pub struct AddressPool {
    /// Candidate addresses in allocation scan order
    scan_order: Vec<String>,
    /// Address → holding interface; absent key means unassigned
    assigned: HashMap<String, String>,
    /// Interface → its assigned address; entries exist only for interfaces
    /// that hold an address
    by_interface: HashMap<String, String>,
    /// The prefix length for all allocations
    prefix_len: u8,
}

impl AddressPool {
    /// Create a pool of `size` addresses sharing `prefix_len`
    pub fn new(size: usize, prefix_len: u8) -> Self {
        let scan_order = (1..=size).map(|i| format!("10.0.{i}.1")).collect();
        Self {
            scan_order,
            assigned: HashMap::new(),
            by_interface: HashMap::new(),
            prefix_len,
        }
    }

    /// The prefix length shared by every allocation
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Number of addresses in the pool
    pub fn size(&self) -> usize {
        self.scan_order.len()
    }

    /// The interface currently holding `address`, if any
    pub fn holder(&self, address: &str) -> Option<&str> {
        self.assigned.get(address).map(String::as_str)
    }

    /// The address currently assigned to `interface`, if any
    pub fn address_of(&self, interface: &str) -> Option<&str> {
        self.by_interface.get(interface).map(String::as_str)
    }

    /// Bind `address` to `interface`, unbinding the interface's previous
    /// address if it moved
    fn bind(&mut self, interface: &str, address: &str) {
        if let Some(previous) = self.by_interface.get(interface).cloned()
            && previous != address
        {
            self.assigned.remove(&previous);
        }
        self.assigned
            .insert(address.to_string(), interface.to_string());
        self.by_interface
            .insert(interface.to_string(), address.to_string());
    }

    /// Get an address for the interface
    ///
    /// Idempotent: an interface that already holds an address gets it back
    /// unchanged. Otherwise the first unassigned address in scan order is
    /// bound. An exhausted pool is an explicit error, never a silent
    /// fallback assignment.
    pub fn allocate(&mut self, interface: &str) -> Result<(String, u8)> {
        if let Some(address) = self.by_interface.get(interface) {
            return Ok((address.clone(), self.prefix_len));
        }

        let free = self
            .scan_order
            .iter()
            .find(|address| !self.assigned.contains_key(*address))
            .cloned();

        match free {
            Some(address) => {
                self.bind(interface, &address);
                debug!(interface, address = address.as_str(), "allocated address");
                Ok((address, self.prefix_len))
            }
            None => Err(Error::PoolExhausted {
                size: self.scan_order.len(),
            }),
        }
    }

    /// Reconcile an observed address/prefix pair with the pool
    ///
    /// The given address survives when it is a pool member that is either
    /// unassigned or already bound to this interface; the pair `matched`
    /// only when the prefix length also equals the pool's, so a good address
    /// with a mismatched prefix still demands a reconfiguration. An address
    /// that cannot be kept is discarded and a fresh allocation made.
    pub fn reconcile(
        &mut self,
        interface: &str,
        address: &str,
        prefix_len: u8,
    ) -> Result<Reconciliation> {
        let in_pool = self.scan_order.iter().any(|a| a == address);
        let available = match self.assigned.get(address) {
            None => in_pool,
            Some(holder) => holder == interface,
        };

        if available {
            self.bind(interface, address);
            return Ok(Reconciliation {
                address: address.to_string(),
                prefix_len: self.prefix_len,
                matched: prefix_len == self.prefix_len,
            });
        }

        let (address, prefix_len) = self.allocate(interface)?;
        Ok(Reconciliation {
            address,
            prefix_len,
            matched: false,
        })
    }

    /// Mark `address` as unassigned
    ///
    /// Returns the `(interface, address)` binding that was removed. No-op
    /// (returning `None`) for an address that is not held by anyone; the
    /// caller may pass a stale value.
    pub fn release(&mut self, address: &str) -> Option<(String, String)> {
        let interface = self.assigned.remove(address)?;
        self.by_interface.remove(&interface);
        debug!(interface = interface.as_str(), address, "released address");
        Some((interface, address.to_string()))
    }
}
