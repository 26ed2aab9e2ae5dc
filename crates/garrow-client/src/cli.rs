//! CLI module for garrow-client.

use std::path::PathBuf;

use clap::Parser;
use garrow_config::{
    CliOverrides, Role, apply_overrides, init_tracing, load_config, validate_config,
};
use garrow_core::DEFAULT_CONFIG_FILE;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// garrow client CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "garrow-client", version, about = "garrow HTTP proxy client")]
pub struct ClientArgs {
    /// Config file path (json/yaml/toml).
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Run the garrow client with the given CLI arguments.
pub async fn run(args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config, Role::Client)?;

    init_tracing(&config.logging);
    info!(config = %args.config.display(), version = garrow_core::VERSION, "starting garrow client");

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    crate::run(config, shutdown).await?;
    Ok(())
}

async fn shutdown_signal_handler() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_and_remote_overrides() {
        let args = ClientArgs::parse_from([
            "garrow-client",
            "--local",
            "127.0.0.1:3128",
            "--server",
            "tunnel.example:8443",
            "--password",
            "pw",
        ]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(args.overrides.local.as_deref(), Some("127.0.0.1:3128"));
        assert_eq!(args.overrides.server.as_deref(), Some("tunnel.example:8443"));
        assert_eq!(args.overrides.password.as_deref(), Some("pw"));
    }
}
