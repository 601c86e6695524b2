//! Network binding.
//!
//! Every transport (HTTP, gRPC, metrics, profiling) binds through
//! [`listener::bind`] so bind failures carry the address that failed.

pub mod listener;

pub use listener::{advertise_addr, bind, endpoint, ListenerError};
