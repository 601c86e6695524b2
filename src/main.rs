//! Example service binary.
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 EXAMPLE SERVICE              │
//!     HTTP  :http_port ───┼─▶ /ping /git_hash /swagger /api/v1/hello     │
//!     gRPC  :grpc_port ───┼─▶ recovery layer → registered services       │
//!                         │                                              │
//!     :prome_port ◀───────┼── /metrics                                   │
//!     :pprof_port ◀───────┼── /debug/pprof/profile                       │
//!                         │                                              │
//!     etcd ◀──────────────┼── /microservices/<name>/<id> (leased)        │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use example_service::build_info::BuildInfo;
use example_service::config::load_config;
use example_service::services::HelloService;
use example_service::Bootstrap;

#[derive(Debug, Parser)]
#[command(name = "example-service", version, about = "Example microservice")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "conf/local/config.toml")]
    config: PathBuf,

    /// Directory for log files
    #[arg(long, default_value = "./logs")]
    log: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            tracing::error!(error = %e, "failed to load config");
            return ExitCode::FAILURE;
        }
    };

    let result = Bootstrap::new(config.server, args.log, Arc::new(HelloService::new()))
        .with_build_info(BuildInfo::from_build_env())
        .with_api_doc(HelloService::api_doc())
        .run()
        .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {e}");
            tracing::error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}
