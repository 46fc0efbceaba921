//! Region resolution
//!
//! Maps a deployment region code to the OAuth authority and to each
//! service's API base URL. Resolved once at startup, read-only afterwards.

use super::constants;
use super::error::{GatewayError, GatewayResult};
use super::models::{RegionConfig, Service};
use log::{debug, warn};
use reqwest::Url;
use std::collections::HashMap;

/// Region codes with a built-in host table
pub const BUILTIN_REGIONS: [&str; 7] = ["us", "eu", "in", "au", "jp", "ca", "cn"];

/// Top-level domain used by a built-in region
fn region_tld(code: &str) -> Option<&'static str> {
    match code {
        "us" | "com" => Some("com"),
        "eu" => Some("eu"),
        "in" => Some("in"),
        "au" => Some("com.au"),
        "jp" => Some("jp"),
        "ca" => Some("ca"),
        "cn" => Some("com.cn"),
        _ => None,
    }
}

/// Built-in host table for a region code
pub fn builtin_region(code: &str) -> Option<RegionConfig> {
    let code = code.trim().to_ascii_lowercase();
    let tld = region_tld(&code)?;

    let mut service_urls = HashMap::new();
    service_urls.insert(Service::Crm, format!("https://www.zohoapis.{}/crm/v2", tld));
    service_urls.insert(
        Service::Scheduling,
        format!("https://www.zohoapis.{}/bookings/v1/json", tld),
    );
    service_urls.insert(
        Service::FileStorage,
        format!("https://www.zohoapis.{}/workdrive/api/v1", tld),
    );
    service_urls.insert(
        Service::MailingLists,
        format!("https://campaigns.zoho.{}/api/v1.1", tld),
    );
    service_urls.insert(
        Service::ProjectMgmt,
        format!("https://projectsapi.zoho.{}/restapi", tld),
    );
    service_urls.insert(Service::Accounting, format!("https://www.zohoapis.{}/books/v3", tld));

    Some(RegionConfig {
        code: if code == "com" { "us".to_string() } else { code },
        authority_url: format!("https://accounts.zoho.{}", tld),
        service_urls,
    })
}

/// Resolves authority and base URLs for the configured region
#[derive(Debug, Clone)]
pub struct RegionResolver {
    region: RegionConfig,
}

impl RegionResolver {
    pub fn new(region: RegionConfig) -> Self {
        debug!(
            "Region '{}' resolved: authority {}, {} service hosts",
            region.code,
            region.authority_url,
            region.service_urls.len()
        );
        Self { region }
    }

    pub fn region(&self) -> &RegionConfig {
        &self.region
    }

    pub fn code(&self) -> &str {
        &self.region.code
    }

    pub fn authority_url(&self) -> &str {
        &self.region.authority_url
    }

    /// Full OAuth token endpoint for this region
    pub fn token_url(&self) -> String {
        constants::token_endpoint(&self.region.authority_url)
    }

    /// API base URL for a service; a missing mapping is a configuration error
    pub fn base_url(&self, service: Service) -> GatewayResult<&str> {
        self.region
            .service_urls
            .get(&service)
            .map(|url| url.as_str())
            .ok_or_else(|| {
                GatewayError::config(
                    service,
                    format!("region '{}' has no base URL for this service", self.region.code),
                )
            })
    }

    /// Full URL for a request path on a service. An absolute URL is accepted
    /// only when it shares the origin of the service's base URL.
    pub fn request_url(&self, service: Service, path: &str) -> GatewayResult<String> {
        let base_url = self.base_url(service)?;
        if !constants::is_absolute_url(path) {
            return Ok(constants::join_url(base_url, path));
        }

        let same_origin = match (Url::parse(base_url), Url::parse(path)) {
            (Ok(base), Ok(target)) => base.origin() == target.origin(),
            _ => false,
        };
        if !same_origin {
            warn!("Refusing absolute URL outside the {} host: {}", service, path);
            return Err(GatewayError::config(
                service,
                format!("absolute URL {} is outside {}", path, base_url),
            ));
        }
        Ok(path.to_string())
    }
}
