use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// One independently-versioned sub-API of the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Service {
    #[serde(rename = "crm")]
    Crm,
    #[serde(rename = "scheduling")]
    Scheduling,
    #[serde(rename = "file-storage")]
    FileStorage,
    #[serde(rename = "mailing-lists")]
    MailingLists,
    #[serde(rename = "project-mgmt")]
    ProjectMgmt,
    #[serde(rename = "accounting")]
    Accounting,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Crm,
        Service::Scheduling,
        Service::FileStorage,
        Service::MailingLists,
        Service::ProjectMgmt,
        Service::Accounting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Crm => "crm",
            Service::Scheduling => "scheduling",
            Service::FileStorage => "file-storage",
            Service::MailingLists => "mailing-lists",
            Service::ProjectMgmt => "project-mgmt",
            Service::Accounting => "accounting",
        }
    }

    /// Fragment used in environment variable names (`ZOHO_<FRAGMENT>_REFRESH_TOKEN`)
    pub fn env_fragment(&self) -> &'static str {
        match self {
            Service::Crm => "CRM",
            Service::Scheduling => "SCHEDULING",
            Service::FileStorage => "FILE_STORAGE",
            Service::MailingLists => "MAILING_LISTS",
            Service::ProjectMgmt => "PROJECT_MGMT",
            Service::Accounting => "ACCOUNTING",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Service::ALL
            .iter()
            .copied()
            .find(|service| service.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Unknown service '{}'", s))
    }
}

/// Client credential and refresh token for one service
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub service: Service,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("service", &self.service)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Cached access token for a service
#[derive(Clone)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_at: Instant,
}

impl TokenInfo {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// OAuth authority and API hosts for a deployment region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionConfig {
    pub code: String,
    pub authority_url: String,
    pub service_urls: HashMap<Service, String>,
}
