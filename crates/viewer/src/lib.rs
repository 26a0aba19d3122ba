//! Interaction coordinator: the single owner of view mode, filter and
//! selection state, keeping both map adapters and the detail panel in step.

pub mod config;
pub mod coordinator;
pub mod state;

pub use config::*;
pub use coordinator::Coordinator;
pub use state::*;
