//! Shared pieces of the example programs: environment configuration,
//! logging and the research team graph.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod team;

pub use config::{DemoConfig, DemoError};

/// Loads `.env`, then installs logging and reports how loading went.
pub fn init() {
    let dotenv = config::load_dotenv();
    init_logging();
    dotenv.log();
}

/// Installs a `tracing` subscriber filtered by `RUST_LOG`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

/// Prints the error of a failed demo and exits with status 1.
pub fn exit_on_error(result: Result<(), DemoError>) {
    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
