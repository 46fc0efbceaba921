//! Generic passthrough: one request through the dispatcher

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Args;
use colored::*;
use log::{debug, info};
use reqwest::Method;
use std::fs;
use std::path::PathBuf;
use zoho_gateway::api::{Gateway, MultipartFile, MultipartForm, Payload, RequestDescriptor, Service};
use zoho_gateway::config::GatewayConfig;

#[derive(Args)]
pub struct RawArgs {
    /// Service tag (crm, scheduling, file-storage, mailing-lists, project-mgmt, accounting)
    pub service: Service,
    /// Path relative to the service base URL
    pub path: String,
    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,
    /// JSON body, or @file to read it from a file
    #[arg(short, long, conflicts_with_all = ["form", "file"])]
    pub data: Option<String>,
    /// Form field (key=value); repeatable
    #[arg(long = "form", value_parser = parse_key_val)]
    pub form: Vec<(String, String)>,
    /// File part for a multipart upload (field=path); repeatable
    #[arg(long = "file", value_parser = parse_key_val)]
    pub file: Vec<(String, String)>,
    /// Query parameter (key=value); repeatable
    #[arg(short, long = "query", value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,
    /// Override the retry budget for this call
    #[arg(long)]
    pub retries: Option<u32>,
    /// Print the gateway metrics after the call
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn read_data(data: &str) -> Result<serde_json::Value> {
    let text = match data.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read body file: {}", path))?,
        None => data.to_string(),
    };
    serde_json::from_str(&text).context("Body is not valid JSON")
}

fn build_descriptor(args: &RawArgs) -> Result<RequestDescriptor> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;

    let mut descriptor = RequestDescriptor::new(args.service, method, args.path.clone());
    for (key, value) in &args.query {
        descriptor = descriptor.query(key.clone(), value.clone());
    }

    if let Some(data) = &args.data {
        descriptor = descriptor.json(read_data(data)?);
    } else if !args.file.is_empty() {
        let mut form = MultipartForm::new();
        for (key, value) in &args.form {
            form = form.text(key.clone(), value.clone());
        }
        for (field, path) in &args.file {
            let path = PathBuf::from(path);
            let content = fs::read(&path).with_context(|| format!("Failed to read file: {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| field.clone());
            form = form.file(MultipartFile {
                field_name: field.clone(),
                file_name,
                content: Bytes::from(content),
                mime_type: None,
            });
        }
        descriptor = descriptor.multipart(form);
    } else if !args.form.is_empty() {
        descriptor = descriptor.form(args.form.clone());
    }

    if let Some(retries) = args.retries {
        descriptor = descriptor.retry_budget(retries);
    }

    Ok(descriptor)
}

pub async fn raw_command(config: &GatewayConfig, args: RawArgs) -> Result<()> {
    info!("Executing raw command: {} {} {}", args.service, args.method, args.path);

    let gateway = Gateway::from_config(config)?;
    let descriptor = build_descriptor(&args)?;
    debug!("Correlation id: {}", descriptor.correlation_id);

    let result = gateway.dispatch(descriptor).await;

    match &result {
        Ok(response) => {
            println!(
                "{} {} {}",
                "✓".green(),
                response.status.to_string().bright_green().bold(),
                format!("(attempts: {}, correlation id: {})", response.attempts, response.correlation_id).dimmed()
            );
            match &response.payload {
                Payload::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
                Payload::Raw(bytes) => println!("{}", String::from_utf8_lossy(bytes)),
                Payload::Empty => println!("{}", "(empty body)".dimmed()),
            }
        }
        Err(err) => {
            println!("{} {} {}", "✗".red(), err.category().red().bold(), err);
            if let Some(correlation_id) = err.correlation_id() {
                println!("  {}", format!("correlation id: {}", correlation_id).dimmed());
            }
        }
    }

    if args.verbose {
        println!("\n📊 Metrics:");
        println!("{}", serde_json::to_string_pretty(&gateway.metrics().snapshot())?);
    }

    result.map(|_| ()).map_err(Into::into)
}
