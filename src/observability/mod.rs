//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stdout + JSON file)
//!     → metrics.rs (counters, summaries; Stat guard per handler)
//!
//! Consumers:
//!     → Log files under --log
//!     → Metrics endpoint (Prometheus scrape on prome_port)
//!     → profiling.rs (CPU flamegraphs on pprof_port)
//! ```

pub mod logging;
pub mod metrics;
pub mod profiling;

pub use logging::init_logging;
pub use metrics::{Exporter, Stat};
