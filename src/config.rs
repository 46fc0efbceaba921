use crate::api::models::{RegionConfig, Service};
use crate::api::region::builtin_region;
use crate::api::resilience::{LogLevel, ResilienceConfig};
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "ZOHO";
const DEFAULT_REGION: &str = "us";

/// Per-service credential settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// Borrow the refresh token of another service
    pub refresh_token_source: Option<Service>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// default, conservative, development or disabled
    pub preset: Option<String>,
    pub retry_budget: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    /// 0 disables the per-call deadline
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub request_logging: Option<bool>,
    pub performance_metrics: Option<bool>,
    pub log_level: Option<String>,
}

/// Region defined or overridden in the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRegion {
    pub authority_url: Option<String>,
    /// Service tag to base URL
    #[serde(default)]
    pub services: HashMap<String, String>,
}

/// On-disk layout; service keys are parsed into [`Service`] after loading
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    region: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    #[serde(default)]
    services: HashMap<String, ServiceSettings>,
    #[serde(default)]
    resilience: ResilienceSettings,
    #[serde(default)]
    regions: HashMap<String, CustomRegion>,
}

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub region: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub services: HashMap<Service, ServiceSettings>,
    pub resilience: ResilienceSettings,
    pub regions: HashMap<String, CustomRegion>,
}

impl GatewayConfig {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("zoho-gateway")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".zoho-gateway")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load `.env`, the default config file (if any) and the environment
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_with(Some(&config_path))
    }

    /// Like [`load`](Self::load) with an explicit file. A missing file is
    /// only an error when the path was given explicitly.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Config file does not exist: {:?}", path);
        }
        Self::load_with(Some(path))
    }

    fn load_with(path: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(env_path) => debug!("Loaded environment from {:?}", env_path),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("Failed to load .env file"),
        }

        let mut config = match path {
            Some(path) if path.exists() => Self::read_file(path)?,
            Some(path) => {
                debug!("No config file at {:?}; using environment only", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config =
            Self::from_toml_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))?;
        info!(
            "Loaded config with {} service sections from {:?}",
            config.services.len(),
            path
        );
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;

        let mut services = HashMap::new();
        for (tag, settings) in file.services {
            let service = Service::from_str(&tag).with_context(|| format!("Unknown service section [services.{}]", tag))?;
            services.insert(service, settings);
        }

        Ok(Self {
            region: file.region,
            client_id: file.client_id,
            client_secret: file.client_secret,
            services,
            resilience: file.resilience,
            regions: file.regions,
        })
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}_{}", ENV_PREFIX, name))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(region) = var("REGION") {
            self.region = Some(region);
        }
        if let Some(client_id) = var("CLIENT_ID") {
            self.client_id = Some(client_id);
        }
        if let Some(client_secret) = var("CLIENT_SECRET") {
            self.client_secret = Some(client_secret);
        }

        for service in Service::ALL {
            let fragment = service.env_fragment();
            let refresh_token = var(&format!("{}_REFRESH_TOKEN", fragment));
            let client_id = var(&format!("{}_CLIENT_ID", fragment));
            let client_secret = var(&format!("{}_CLIENT_SECRET", fragment));
            let source = var(&format!("{}_REFRESH_TOKEN_SOURCE", fragment))
                .map(|value| {
                    Service::from_str(&value)
                        .with_context(|| format!("Invalid {}_{}_REFRESH_TOKEN_SOURCE", ENV_PREFIX, fragment))
                })
                .transpose()?;

            if refresh_token.is_none() && client_id.is_none() && client_secret.is_none() && source.is_none() {
                continue;
            }

            let settings = self.services.entry(service).or_default();
            if refresh_token.is_some() {
                settings.refresh_token = refresh_token;
            }
            if client_id.is_some() {
                settings.client_id = client_id;
            }
            if client_secret.is_some() {
                settings.client_secret = client_secret;
            }
            if source.is_some() {
                settings.refresh_token_source = source;
            }
        }

        if let Some(budget) = var("RETRY_BUDGET") {
            self.resilience.retry_budget = Some(budget.parse().context("Invalid ZOHO_RETRY_BUDGET")?);
        }
        if let Some(base) = var("BACKOFF_BASE_MS") {
            self.resilience.backoff_base_ms = Some(base.parse().context("Invalid ZOHO_BACKOFF_BASE_MS")?);
        }
        if let Some(timeout) = var("REQUEST_TIMEOUT_SECS") {
            self.resilience.request_timeout_secs =
                Some(timeout.parse().context("Invalid ZOHO_REQUEST_TIMEOUT_SECS")?);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.region_config()?;
        self.resilience()?;
        Ok(())
    }

    pub fn service(&self, service: Service) -> Option<&ServiceSettings> {
        self.services.get(&service)
    }

    pub fn region_code(&self) -> String {
        self.region
            .as_deref()
            .map(|code| code.trim().to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Host table for the configured region. A `[regions.<code>]` section
    /// overrides built-in hosts or defines a region from scratch.
    pub fn region_config(&self) -> Result<RegionConfig> {
        let code = self.region_code();
        let custom = self.regions.get(&code);

        let mut region = match (builtin_region(&code), custom) {
            (Some(region), _) => region,
            (None, Some(custom)) => RegionConfig {
                code: code.clone(),
                authority_url: custom
                    .authority_url
                    .clone()
                    .with_context(|| format!("Custom region '{}' needs an authority_url", code))?,
                service_urls: HashMap::new(),
            },
            (None, None) => anyhow::bail!("Unknown region '{}'", code),
        };

        if let Some(custom) = custom {
            if let Some(authority_url) = &custom.authority_url {
                region.authority_url = authority_url.trim_end_matches('/').to_string();
            }
            for (tag, url) in &custom.services {
                let service = Service::from_str(tag)
                    .with_context(|| format!("Unknown service '{}' in [regions.{}]", tag, code))?;
                region.service_urls.insert(service, url.trim_end_matches('/').to_string());
            }
            debug!("Applied custom host overrides for region '{}'", code);
        }

        Ok(region)
    }

    /// Resilience settings resolved onto a preset
    pub fn resilience(&self) -> Result<ResilienceConfig> {
        let settings = &self.resilience;
        let mut config = match settings.preset.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("default") => ResilienceConfig::default(),
            Some("conservative") => ResilienceConfig::conservative(),
            Some("development") => ResilienceConfig::development(),
            Some("disabled") => ResilienceConfig::disabled(),
            Some(other) => anyhow::bail!("Unknown resilience preset '{}'", other),
        };

        if let Some(budget) = settings.retry_budget {
            config.retry.retry_budget = budget;
        }
        if let Some(base) = settings.backoff_base_ms {
            config.retry.base_delay = Duration::from_millis(base);
        }
        if let Some(max) = settings.max_backoff_ms {
            config.retry.max_delay = Duration::from_millis(max);
        }
        if let Some(timeout) = settings.request_timeout_secs {
            config.call_timeout = (timeout > 0).then(|| Duration::from_secs(timeout));
        }
        if let Some(timeout) = settings.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(timeout);
        }
        if let Some(enabled) = settings.request_logging {
            config.monitoring.request_logging = enabled;
        }
        if let Some(enabled) = settings.performance_metrics {
            config.monitoring.performance_metrics = enabled;
        }
        if let Some(level) = &settings.log_level {
            config.monitoring.log_level =
                LogLevel::from_str(level).with_context(|| format!("Invalid log level '{}'", level))?;
        }

        Ok(config)
    }
}
