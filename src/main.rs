//! Unified garrow CLI.
//!
//! - `garrow server` - Run the tunnel server
//! - `garrow client` - Run the local HTTP proxy
//!
//! Each subcommand can also be run as a standalone binary.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// garrow unified CLI.
#[derive(Parser)]
#[command(
    name = "garrow",
    version,
    about = "Encrypted TCP tunneling proxy",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tunnel server.
    #[command(name = "server", alias = "serve")]
    Server(Box<garrow_server::ServerArgs>),

    /// Run the local HTTP proxy client.
    #[command(name = "client")]
    Client(Box<garrow_client::ClientArgs>),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Server(args) => garrow_server::cli::run(*args).await,
        Commands::Client(args) => garrow_client::cli::run(*args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
