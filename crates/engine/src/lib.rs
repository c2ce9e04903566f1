// In crates/engine/src/lib.rs

//! The view-state synchronizer behind the Control Tower dashboard.

pub mod state;
pub mod synchronizer;
pub mod task;

pub use state::ViewState;
pub use synchronizer::Synchronizer;
