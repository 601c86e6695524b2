//! Coordination helpers for background jobs shared by several instances.

pub mod mutex;

pub use mutex::{holds_slot, MutexJobUtil};
