//! dataflux - CLI entry point
//!
//! Thin wrapper around the library: argument parsing, configuration loading,
//! logging setup, Ctrl+C handling and command dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use dataflux::cancel::CancelToken;
use dataflux::cli::{Args, run_cli};
use dataflux::config::Config;
use env_logger::{Builder, Env};
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("Failed to load config file {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    match &args.log_level {
        Some(level) => Builder::new().parse_filters(level).init(),
        None => Builder::from_env(Env::default().default_filter_or(&config.logging.level)).init(),
    }
    debug!("Configuration: {:?}", config);

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if shutdown_flag_clone.swap(true, Ordering::SeqCst) {
            eprintln!("\nForce shutdown requested. Exiting immediately...");
            std::process::exit(130);
        }
        eprintln!("\nStopping after the current file... (Press Ctrl+C again to force quit)");
    }) {
        warn!("Could not install Ctrl+C handler: {}", e);
    }

    run_cli(args.command, &config, &CancelToken::from_flag(shutdown_flag))
}
