//! HTTP transport.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, trace + catch-panic layers)
//!     → handlers.rs (/ping, /git_hash)
//!     → openapi.rs (/swagger UI and /swagger/doc.json)
//!     → routes registered by the hosted service (/api/v1/...)
//! ```

pub mod handlers;
pub mod openapi;
pub mod server;

pub use handlers::StatusResponse;
pub use server::HttpServer;
