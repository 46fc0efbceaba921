use anyhow::Result;
use colored::*;
use log::info;
use zoho_gateway::api::{CredentialRegistry, RegionResolver, Service};
use zoho_gateway::config::GatewayConfig;

pub fn status_command(config: &GatewayConfig) -> Result<()> {
    info!("Executing status command");

    let resolver = RegionResolver::new(config.region_config()?);
    let registry = CredentialRegistry::from_config(config);
    let resilience = config.resilience()?;

    println!("{}", "Gateway Status".bold());
    println!("==============");
    println!("Region:    {}", resolver.code().bright_green().bold());
    println!("Authority: {}", resolver.token_url().cyan());
    println!(
        "Retries:   {} (backoff base {}ms)",
        resilience.retry.retry_budget,
        resilience.retry.base_delay.as_millis()
    );
    match resilience.call_timeout {
        Some(timeout) => println!("Deadline:  {}s per call", timeout.as_secs()),
        None => println!("Deadline:  {}", "none".dimmed()),
    }

    println!("\nServices:");
    for service in Service::ALL {
        let base_url = resolver
            .base_url(service)
            .map(str::to_string)
            .unwrap_or_else(|_| "no base URL".to_string());

        match registry.missing().get(&service) {
            None => println!("  {} {:<14} {}", "✓".green(), service.as_str(), base_url.dimmed()),
            Some(reason) => println!(
                "  {} {:<14} {} ({})",
                "✗".red(),
                service.as_str(),
                base_url.dimmed(),
                reason.yellow()
            ),
        }
    }

    Ok(())
}
