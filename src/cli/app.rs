use super::commands::RawArgs;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use zoho_gateway::api::Service;

#[derive(Parser)]
#[command(name = "zoho-gateway")]
#[command(about = "Call the platform's service APIs through the integration gateway")]
pub struct Cli {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the region, configured services and their base URLs
    Status,
    /// Acquire an access token for a service
    Token {
        /// Service tag (crm, scheduling, file-storage, mailing-lists, project-mgmt, accounting)
        service: Service,
        /// Print the token instead of a redacted prefix
        #[arg(long)]
        show: bool,
    },
    /// Send a request to a service through the dispatcher
    Raw(RawArgs),
}
