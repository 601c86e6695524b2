//! gRPC transport.
//!
//! # Data Flow
//! ```text
//! TCP connection (HTTP/2)
//!     → server.rs (tonic Server)
//!     → recovery.rs (panic → Status::internal)
//!     → services registered by the hosted service
//! ```

pub mod recovery;
pub mod server;

pub use recovery::RecoveryLayer;
pub use server::GrpcServer;
