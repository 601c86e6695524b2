//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Logging → Config checks → Discovery client → Transports → App start
//!     → Profiling → Metrics
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown
//!
//! Shutdown (shutdown.rs + startup.rs):
//!     App stop (deregister, stop accepting) → Service close → Metrics stop
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start before registration (traffic only when ready)
//! - Metrics stop last

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{wait_for_termination, Termination};
pub use startup::{discovery_name, load, Bootstrap, Running};
