//! Domain error types.
//!
//! These errors represent validation failures in the domain layer. They
//! are distinct from search outcomes and storage errors.

use super::{Cell, Domain};

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    /// Box corners must share a domain
    #[error("box corners span domains {0} and {1}")]
    CrossDomainBox(Domain, Domain),

    /// Tunnel cost may not be negative
    #[error("tunnel cost must be non-negative, got {0}")]
    NegativeTunnelCost(i64),

    /// Tunnel cost must fit in 32 bits
    #[error("tunnel cost {0} exceeds {max}", max = u32::MAX)]
    TunnelCostTooLarge(i64),

    /// Path has no steps
    #[error("path must have at least one step")]
    EmptyPath,

    /// Consecutive segments don't connect
    #[error("segment ending at {0} does not connect to segment starting at {1}")]
    SegmentsNotConnected(Cell, Cell),

    /// Itinerary has no segments
    #[error("itinerary must have at least one segment")]
    EmptyItinerary,
}
