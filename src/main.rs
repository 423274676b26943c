use clap::{Parser, Subcommand};

use rtc_relay::{config::RelayConfig, peer, server, util::init_log};

#[derive(Debug, Parser)]
#[command(name = "rtc-relay", version, about = "Real-time message relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the relay hub
    Server(RelayConfig),

    /// Connect to a relay hub, send a message and print what comes back
    Peer {
        #[arg(long, env = "RELAY_URL", default_value = "ws://127.0.0.1:8080")]
        url: String,

        #[arg(long, default_value = "hello")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_log();

    match cli.command {
        Command::Server(config) => server::main(config).await?,
        Command::Peer { url, message } => peer::main(&url, &message).await?,
    }

    Ok(())
}
