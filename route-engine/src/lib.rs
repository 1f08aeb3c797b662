//! Route planning through a voxel world.
//!
//! Answers "how do I get from this cell to that target?" where travel may
//! combine several movement modes and tunnels between otherwise separate
//! domains. Searches run in small slices on a shared worker pool so many
//! of them can make progress at once.

pub mod cache;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod manager;
pub mod navigation;
pub mod planner;
pub mod records;
pub mod tunnels;
