use anyhow::Result;
use colored::*;
use log::info;
use std::time::Instant;
use zoho_gateway::api::{Gateway, Service};
use zoho_gateway::config::GatewayConfig;

fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}…", prefix)
}

pub async fn token_command(config: &GatewayConfig, service: Service, show: bool) -> Result<()> {
    info!("Executing token command for {}", service);

    let gateway = Gateway::from_config(config)?;
    let token = gateway.tokens().get_token_info(service).await?;
    let remaining = token.expires_at.saturating_duration_since(Instant::now());

    println!("{} Access token for {}", "✓".green(), service.as_str().bright_green().bold());
    if show {
        println!("  Token:   {}", token.access_token);
    } else {
        println!("  Token:   {} {}", redact(&token.access_token), "(use --show to print)".dimmed());
    }
    println!("  Expires: in {}s", remaining.as_secs());

    Ok(())
}
