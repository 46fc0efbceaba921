use anyhow::Result;
use clap::Parser;
use log::info;
use zoho_gateway::config::GatewayConfig;

mod cli;

use cli::{Cli, Commands};
use cli::commands::{raw_command, status_command, token_command};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    info!("Starting zoho-gateway");

    let config = match &cli.config {
        Some(path) => GatewayConfig::load_from(path)?,
        None => GatewayConfig::load()?,
    };

    match cli.command {
        Commands::Status => status_command(&config),
        Commands::Token { service, show } => token_command(&config, service, show).await,
        Commands::Raw(args) => raw_command(&config, args).await,
    }
}
