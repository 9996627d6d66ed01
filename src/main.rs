//! # Write Latency Benchmark - Main Entry Point
//!
//! The binary has two modes:
//!
//! - **Benchmark** (default): connect to `--target`, run the closed write loop
//!   for the configured time, write the results file and print a summary.
//! - **Serve** (`--serve`): run the reference target server on `--target`
//!   until Ctrl-C.
//!
//! ## Exit Codes
//!
//! - `0`: run completed, even if the results file could not be written
//! - `1`: setup failure (invalid configuration, connection refused) or worker panic
//! - `2`: a write failed during measurement
//! - `3`: the latency recorder ran out of capacity
//! - `4`: the checkpoint sequence was malformed
//!
//! This is the only place in the crate that exits the process.

use anyhow::{Context, Result};
use clap::Parser;
use write_latency_bench::{
    backend::{ReferenceServer, ServerConfig},
    benchmark::{BenchmarkConfig, BenchmarkRunner},
    cli::Args,
    logging::init_logging,
    RunError,
};
use tracing::{debug, error, info};

fn main() {
    let args = Args::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let log_guard = match init_logging(args.verbose, args.quiet, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    debug!("Configuration: {:?}", args);

    let code = if args.serve {
        match serve(&args) {
            Ok(()) => 0,
            Err(e) => {
                error!("Reference server failed: {:#}", e);
                1
            }
        }
    } else {
        match run_benchmark(&args) {
            Ok(()) => 0,
            Err(e) => {
                report_failure(&e);
                e.exit_code()
            }
        }
    };

    if code != 0 {
        // Dropping the guard flushes the file writer before exiting
        drop(log_guard);
        std::process::exit(code);
    }
}

fn run_benchmark(args: &Args) -> Result<(), RunError> {
    info!("Starting Write Latency Benchmark");
    let config = BenchmarkConfig::from_args(args)?;

    let outcome = BenchmarkRunner::new(config).run()?;
    info!(
        "Benchmark completed: {} writes at {:.2} writes/s overall",
        outcome.operations, outcome.report.overall.throughput.ops_per_second
    );
    Ok(())
}

fn report_failure(err: &RunError) {
    match err {
        RunError::Fatal(fatal) => error!("Benchmark aborted: {}", fatal),
        RunError::Setup(setup) => error!("Benchmark setup failed: {:#}", setup),
    }
}

/// Run the reference server on the configured target until Ctrl-C
fn serve(args: &Args) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("reference-server")
        .build()
        .context("Failed to build the tokio runtime")?;

    runtime.block_on(async {
        let config = ServerConfig {
            max_payload: args.max_payload,
        };
        let server = ReferenceServer::bind(&args.target, config).await?;
        info!("Press Ctrl-C to stop the server");
        server
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
            })
            .await
    })
}
