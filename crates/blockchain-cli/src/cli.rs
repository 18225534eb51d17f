use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blockchain-node", about = "rdPoS application-layer blockchain node")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a node from a config file.
    Run {
        #[arg(long)]
        config: PathBuf,
    },
    /// Generate a new validator/account keypair and write it to a keystore file.
    Keygen {
        #[arg(long)]
        out: PathBuf,
    },
}
