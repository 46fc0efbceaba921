//! Shared fixtures: a mock server standing in for both the OAuth authority
//! and every service host.

#![allow(dead_code)]

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};
use zoho_gateway::api::{
    Clock, CredentialRecord, CredentialRegistry, Gateway, RegionConfig, ResilienceConfig, Service, SystemClock,
};

pub const TOKEN_PATH: &str = "/oauth/v2/token";

/// Region whose authority and service hosts all live on the mock server.
/// Service `s` is rooted at `/{s}`.
pub fn region_for(server: &MockServer) -> RegionConfig {
    let service_urls = Service::ALL
        .iter()
        .map(|service| (*service, format!("{}/{}", server.uri(), service.as_str())))
        .collect::<HashMap<_, _>>();

    RegionConfig {
        code: "test".to_string(),
        authority_url: server.uri(),
        service_urls,
    }
}

pub fn registry_for(services: &[Service]) -> CredentialRegistry {
    CredentialRegistry::new(services.iter().map(|service| CredentialRecord {
        service: *service,
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        refresh_token: format!("{}-refresh", service.as_str()),
    }))
}

/// Short backoff so rate-limit tests stay fast
pub fn fast_resilience() -> ResilienceConfig {
    ResilienceConfig::builder()
        .backoff_base(Duration::from_millis(10))
        .call_timeout(Some(Duration::from_secs(10)))
        .build()
}

pub fn gateway(server: &MockServer, services: &[Service]) -> Gateway {
    gateway_with(server, services, fast_resilience(), Arc::new(SystemClock))
}

pub fn gateway_with(
    server: &MockServer,
    services: &[Service],
    resilience: ResilienceConfig,
    clock: Arc<dyn Clock>,
) -> Gateway {
    Gateway::with_clock(registry_for(services), region_for(server), resilience, clock).unwrap()
}

pub fn token_body(token: &str, expires_in: u64) -> serde_json::Value {
    json!({
        "access_token": token,
        "expires_in": expires_in,
        "api_domain": "https://www.zohoapis.com",
        "token_type": "Bearer"
    })
}

/// OAuth authority that always hands out `token`
pub async fn mount_token(server: &MockServer, token: &str, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(token, expires_in)))
        .mount(server)
        .await;
}

/// OAuth authority that hands out each token once, in order
pub async fn mount_token_sequence(server: &MockServer, tokens: &[&str], expires_in: u64) {
    for token in tokens {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(token, expires_in)))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

pub async fn requests_to(server: &MockServer, prefix: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path().starts_with(prefix))
        .collect()
}

pub async fn token_requests(server: &MockServer) -> usize {
    requests_to(server, TOKEN_PATH).await.len()
}

pub fn request_header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|value| value.to_str().ok())
}
