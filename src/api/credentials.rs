//! Credential registry
//!
//! Static mapping from service to {client id, client secret, refresh token},
//! built once from configuration. Services without a usable credential are
//! remembered with the reason so the first call fails fast with a
//! configuration error instead of attempting a token refresh.

use super::error::{GatewayError, GatewayResult};
use super::models::{CredentialRecord, Service};
use crate::config::GatewayConfig;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct CredentialRegistry {
    records: HashMap<Service, CredentialRecord>,
    missing: BTreeMap<Service, String>,
}

impl CredentialRegistry {
    /// Registry holding exactly the given records
    pub fn new(records: impl IntoIterator<Item = CredentialRecord>) -> Self {
        let records: HashMap<_, _> = records
            .into_iter()
            .map(|record| (record.service, record))
            .collect();
        let missing = Service::ALL
            .iter()
            .filter(|service| !records.contains_key(service))
            .map(|service| (*service, "no credential configured".to_string()))
            .collect();
        Self { records, missing }
    }

    /// Build the registry from loaded configuration.
    ///
    /// A service's refresh token is its own, or the one of the service named
    /// by its `refresh_token_source`. Sources are not followed transitively.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut records = HashMap::new();
        let mut missing = BTreeMap::new();

        for service in Service::ALL {
            let settings = config.service(service);

            let client_id = settings
                .and_then(|s| s.client_id.clone())
                .or_else(|| config.client_id.clone());
            let client_secret = settings
                .and_then(|s| s.client_secret.clone())
                .or_else(|| config.client_secret.clone());

            let own_token = settings.and_then(|s| s.refresh_token.clone());
            let refresh_token = match (own_token, settings.and_then(|s| s.refresh_token_source)) {
                (Some(token), source) => {
                    if let Some(source) = source {
                        debug!(
                            "{} has its own refresh token; ignoring refresh_token_source = {}",
                            service, source
                        );
                    }
                    Some(token)
                }
                (None, Some(source)) if source == service => {
                    missing.insert(service, "refresh_token_source points at itself".to_string());
                    continue;
                }
                (None, Some(source)) => {
                    match config.service(source).and_then(|s| s.refresh_token.clone()) {
                        Some(token) => {
                            info!(
                                "{} reuses the refresh token of {} (refresh_token_source = \"{}\")",
                                service, source, source
                            );
                            Some(token)
                        }
                        None => {
                            missing.insert(
                                service,
                                format!("refresh_token_source '{}' has no refresh token of its own", source),
                            );
                            continue;
                        }
                    }
                }
                (None, None) => None,
            };

            match (client_id, client_secret, refresh_token) {
                (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                    records.insert(
                        service,
                        CredentialRecord {
                            service,
                            client_id,
                            client_secret,
                            refresh_token,
                        },
                    );
                }
                (client_id, client_secret, refresh_token) => {
                    let mut absent = Vec::new();
                    if client_id.is_none() {
                        absent.push("client id");
                    }
                    if client_secret.is_none() {
                        absent.push("client secret");
                    }
                    if refresh_token.is_none() {
                        absent.push("refresh token");
                    }
                    missing.insert(service, format!("missing {}", absent.join(", ")));
                }
            }
        }

        for (service, reason) in &missing {
            warn!("Service {} is not usable: {}", service, reason);
        }
        info!(
            "Credential registry loaded: {} of {} services configured",
            records.len(),
            Service::ALL.len()
        );

        Self { records, missing }
    }

    /// Credential tuple for a service, or a configuration error
    pub fn credentials(&self, service: Service) -> GatewayResult<&CredentialRecord> {
        self.records.get(&service).ok_or_else(|| {
            let reason = self
                .missing
                .get(&service)
                .cloned()
                .unwrap_or_else(|| "no credential configured".to_string());
            GatewayError::config(service, reason)
        })
    }

    pub fn is_configured(&self, service: Service) -> bool {
        self.records.contains_key(&service)
    }

    /// Services that have a usable credential, in declaration order
    pub fn configured_services(&self) -> Vec<Service> {
        Service::ALL
            .iter()
            .copied()
            .filter(|service| self.records.contains_key(service))
            .collect()
    }

    /// Why each unusable service is unusable
    pub fn missing(&self) -> &BTreeMap<Service, String> {
        &self.missing
    }
}
