//! Domain types for the route engine.
//!
//! This module contains the core domain model types: coordinates,
//! targets, tunnels and the paths and itineraries built from them.
//! Types enforce their invariants at construction time, so code that
//! receives them can trust their validity.

mod cell;
mod error;
mod itinerary;
mod mode_type;
mod path;
mod target;
mod tunnel;

pub use cell::{Cell, CellBox, Domain};
pub use error::DomainError;
pub use itinerary::{Itinerary, Segment};
pub use mode_type::{ModeSet, ModeType};
pub use path::{Path, Step};
pub use target::{CellSupplier, Target};
pub use tunnel::{Caller, Tunnel, TunnelPrompt};
