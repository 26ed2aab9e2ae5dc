//! CLI module for garrow-server.
//!
//! Used by the standalone binary and by the `garrow server` subcommand.

use std::path::PathBuf;

use clap::Parser;
use garrow_config::{
    CliOverrides, Role, apply_overrides, init_tracing, load_config, validate_config,
};
use garrow_core::DEFAULT_CONFIG_FILE;
use tracing::{info, warn};

use crate::{CancellationToken, run_with_shutdown};

/// garrow server CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "garrow-server", version, about = "garrow encrypted tunnel server")]
pub struct ServerArgs {
    /// Config file path (json/yaml/toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Load the config, install logging and run the server until SIGINT/SIGTERM.
pub async fn run(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config, Role::Server)?;

    init_tracing(&config.logging);
    info!(config = %args.config.display(), version = garrow_core::VERSION, "starting garrow server");

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    run_with_shutdown(config, shutdown).await?;
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_and_overrides() {
        let args = ServerArgs::parse_from([
            "garrow-server",
            "-c",
            "/etc/garrow.toml",
            "--server",
            "0.0.0.0:9000",
            "--pool-keep-alive-secs",
            "5",
        ]);
        assert_eq!(args.config, PathBuf::from("/etc/garrow.toml"));
        assert_eq!(args.overrides.server.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(args.overrides.pool_keep_alive_secs, Some(5));
    }

    #[test]
    fn default_config_path() {
        let args = ServerArgs::parse_from(["garrow-server"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }
}
