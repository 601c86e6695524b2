//! Microservice scaffold: one business service hosted behind HTTP and gRPC,
//! registered in etcd, with Prometheus metrics and CPU profiling on the side.

// Core subsystems
pub mod app;
pub mod config;
pub mod http;
pub mod net;
pub mod rpc;

// Discovery and coordination
pub mod discovery;
pub mod jobs;

// Cross-cutting concerns
pub mod build_info;
pub mod error;
pub mod lifecycle;
pub mod observability;

// Hosted services
pub mod service;
pub mod services;

pub use error::BootError;
pub use lifecycle::Bootstrap;
pub use service::Service;
