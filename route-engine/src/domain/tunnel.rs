//! Tunnels: non-physical links between cells.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::{Cell, DomainError, Target};

/// Side effect that guides a traveler into using a tunnel.
pub type TunnelPrompt = Arc<dyn Fn() + Send + Sync>;

/// A directed shortcut from an entrance target to a fixed exit cell.
///
/// The entrance may be a region or even a moving point. The exit may be
/// in a different domain from the entrance, which is the only way to
/// cross between domains.
#[derive(Clone)]
pub struct Tunnel {
    name: Option<String>,
    entrance: Target,
    exit: Cell,
    cost: u32,
    permission: Option<String>,
    prompt: Option<TunnelPrompt>,
}

impl Tunnel {
    /// Creates a tunnel with no permission gate and no prompt.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `cost` is negative or does not fit in a `u32`.
    pub fn new(entrance: impl Into<Target>, exit: Cell, cost: i64) -> Result<Self, DomainError> {
        if cost < 0 {
            return Err(DomainError::NegativeTunnelCost(cost));
        }
        let cost = u32::try_from(cost).map_err(|_| DomainError::TunnelCostTooLarge(cost))?;
        Ok(Self {
            name: None,
            entrance: entrance.into(),
            exit,
            cost,
            permission: None,
            prompt: None,
        })
    }

    /// Sets a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the tunnel to callers holding `permission`.
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Sets the prompt run when a traveler must be guided into the tunnel.
    pub fn with_prompt<F>(mut self, prompt: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.prompt = Some(Arc::new(prompt));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn entrance(&self) -> &Target {
        &self.entrance
    }

    pub fn exit(&self) -> Cell {
        self.exit
    }

    /// Cost of traversal. A cost of 1 is one cell of plain walking.
    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn permission(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    /// Returns true if `caller` may use this tunnel.
    pub fn permits(&self, caller: &Caller) -> bool {
        self.permission
            .as_deref()
            .is_none_or(|permission| caller.has_permission(permission))
    }

    /// Freezes a moving entrance at its current position.
    ///
    /// Returns `None` if the entrance cannot currently be resolved.
    pub fn snapshot(&self) -> Option<Tunnel> {
        if !self.entrance.is_moving() {
            return Some(self.clone());
        }
        let entrance = self.entrance.snapshot()?;
        Some(Tunnel {
            entrance,
            ..self.clone()
        })
    }

    /// Runs the prompt, if any.
    pub fn prompt(&self) {
        if let Some(prompt) = &self.prompt {
            prompt();
        }
    }
}

impl fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("name", &self.name)
            .field("entrance", &self.entrance)
            .field("exit", &self.exit)
            .field("cost", &self.cost)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

/// Whoever requested a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub name: String,
    permissions: HashSet<String>,
}

impl Caller {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: HashSet::new(),
        }
    }

    /// Grants a permission.
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}
