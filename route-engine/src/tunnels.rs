//! Tunnel registries.
//!
//! Tunnels come from outside the search (configured warps, detected
//! portals, per-player links). A registry hands each new session a
//! snapshot; later changes to the registry never reach a running search.

use std::sync::Arc;

use crate::domain::{Caller, Tunnel};

/// A source of tunnels.
pub trait TunnelRegistry: Send + Sync {
    /// Returns the tunnels `caller` may use right now.
    fn tunnels(&self, caller: &Caller) -> Vec<Tunnel>;
}

/// A fixed collection of tunnels.
#[derive(Debug, Clone, Default)]
pub struct StaticTunnels {
    tunnels: Vec<Tunnel>,
}

impl StaticTunnels {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder.
    pub fn builder() -> StaticTunnelsBuilder {
        StaticTunnelsBuilder::default()
    }

    /// Add a tunnel.
    pub fn add(&mut self, tunnel: Tunnel) {
        self.tunnels.push(tunnel);
    }

    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }
}

impl TunnelRegistry for StaticTunnels {
    fn tunnels(&self, caller: &Caller) -> Vec<Tunnel> {
        self.tunnels.iter().filter(|t| t.permits(caller)).cloned().collect()
    }
}

/// Several registries consulted together.
impl TunnelRegistry for Vec<Arc<dyn TunnelRegistry>> {
    fn tunnels(&self, caller: &Caller) -> Vec<Tunnel> {
        self.iter().flat_map(|registry| registry.tunnels(caller)).collect()
    }
}

/// Builder for creating tunnel collections.
///
/// Provides a fluent API for adding tunnels.
#[derive(Debug, Default)]
pub struct StaticTunnelsBuilder {
    inner: StaticTunnels,
}

impl StaticTunnelsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tunnel.
    pub fn add(mut self, tunnel: Tunnel) -> Self {
        self.inner.add(tunnel);
        self
    }

    /// Build the collection.
    pub fn build(self) -> StaticTunnels {
        self.inner
    }
}
