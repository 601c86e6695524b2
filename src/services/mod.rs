//! Concrete services hosted by the orchestrator.

pub mod hello;

pub use hello::HelloService;
