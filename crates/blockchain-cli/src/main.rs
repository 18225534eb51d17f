mod cli;
mod config;
mod node;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config: path } => {
            let config = config::NodeConfig::load(&path)?;
            node::run(config).await
        }
        Commands::Keygen { out } => node::keygen(&out),
    }
}
