use clap::Parser;
use corelib::Network;

use crate::commands::Command;

/// Build and drive a small Chord ring from the command line.
#[derive(Parser, Debug)]
#[command(name = "chord-dht", version, about = "Chord DHT routing core demo")]
pub struct CliConfig {
    /// Ring bit-width (ring size is 2^bits).
    #[arg(long, default_value_t = 4)]
    pub bits: u32,

    /// Comma-separated initial node ids, seeded and joined in order.
    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub nodes: Vec<u64>,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn run(self) -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();

        let network = Network::create(self.bits, &self.nodes)?;
        self.command.execute(&network)
    }
}
