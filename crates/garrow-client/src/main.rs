//! garrow client standalone binary.

use clap::Parser;
use garrow_client::{ClientArgs, cli};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();
    cli::run(args).await
}
