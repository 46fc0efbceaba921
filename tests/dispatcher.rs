mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zoho_gateway::api::{
    GatewayError, Payload, RequestDescriptor, RequestOptions, ResilienceConfig, Service, SystemClock,
};

async fn mount_leads(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/crm/Leads"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn successful_call_sends_gateway_headers() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    Mock::given(method("GET"))
        .and(path("/crm/Leads"))
        .and(header("Authorization", "Zoho-oauthtoken A"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "1"}]})))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server, &[Service::Crm]);

    let response = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.attempts, 1);
    assert_eq!(response.json().unwrap()["data"][0]["id"], "1");

    let requests = requests_to(&server, "/crm").await;
    assert_eq!(request_header(&requests[0], "x-correlation-id"), Some(response.correlation_id.as_str()));
}

#[tokio::test]
async fn token_is_reused_across_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A", 3600)))
        .expect(1)
        .mount(&server)
        .await;
    mount_leads(&server, ResponseTemplate::new(200).set_body_json(json!({"data": []}))).await;
    let gateway = gateway(&server, &[Service::Crm]);

    for _ in 0..3 {
        gateway
            .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
            .await
            .unwrap();
    }
    assert_eq!(requests_to(&server, "/crm").await.len(), 3);
}

#[tokio::test]
async fn unauthorized_invalidates_and_retries_once() {
    let server = MockServer::start().await;
    mount_token_sequence(&server, &["A", "B"], 3600).await;
    Mock::given(method("GET"))
        .and(path("/crm/Leads"))
        .and(header("Authorization", "Zoho-oauthtoken A"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"code": "INVALID_TOKEN"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/Leads"))
        .and(header("Authorization", "Zoho-oauthtoken B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server, &[Service::Crm]);

    let response = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap();

    assert_eq!(response.attempts, 2);
    assert_eq!(token_requests(&server).await, 2);

    let requests = requests_to(&server, "/crm").await;
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request_header(request, "x-correlation-id"), Some(response.correlation_id.as_str()));
        assert_eq!(request.headers.get_all("authorization").iter().count(), 1);
    }
}

#[tokio::test]
async fn second_unauthorized_without_budget_fails() {
    let server = MockServer::start().await;
    mount_token_sequence(&server, &["A", "B"], 3600).await;
    mount_leads(&server, ResponseTemplate::new(401)).await;
    let gateway = gateway(&server, &[Service::Crm]);

    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads").retry_budget(1))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "authentication_failed");
    assert_eq!(err.status(), Some(401));
    assert!(matches!(err, GatewayError::AuthenticationFailed { attempts: 2, .. }));
    assert_eq!(requests_to(&server, "/crm").await.len(), 2);
}

#[tokio::test]
async fn rate_limited_after_budget_with_growing_delays() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    mount_leads(&server, ResponseTemplate::new(429)).await;
    let gateway = gateway(&server, &[Service::Crm]);

    let started = Instant::now();
    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "rate_limited");
    assert!(err.is_retryable_later());
    assert_eq!(requests_to(&server, "/crm").await.len(), 3);
    // 10ms then 20ms
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(token_requests(&server).await, 1);

    let metrics = gateway.metrics().service_metrics(Service::Crm).unwrap();
    assert_eq!(metrics.failed_calls, 1);
    assert_eq!(metrics.total_retries, 2);
    assert_eq!(metrics.total_backoff, Duration::from_millis(30));
    assert_eq!(metrics.error_categories["rate_limited"], 1);
}

#[tokio::test]
async fn rate_limit_then_success() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    Mock::given(method("GET"))
        .and(path("/crm/Leads"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_leads(&server, ResponseTemplate::new(200).set_body_json(json!({"data": []}))).await;
    let gateway = gateway(&server, &[Service::Crm]);

    let response = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap();

    assert_eq!(response.attempts, 2);
    let requests = requests_to(&server, "/crm").await;
    assert_eq!(request_header(&requests[0], "x-correlation-id"), request_header(&requests[1], "x-correlation-id"));
}

#[tokio::test]
async fn zero_budget_surfaces_first_rate_limit() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    mount_leads(&server, ResponseTemplate::new(429)).await;
    let gateway = gateway(&server, &[Service::Crm]);

    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads").retry_budget(0))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "rate_limited");
    assert_eq!(requests_to(&server, "/crm").await.len(), 1);
}

#[tokio::test]
async fn correlation_ids_differ_between_calls() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    mount_leads(&server, ResponseTemplate::new(200).set_body_json(json!({}))).await;
    let gateway = gateway(&server, &[Service::Crm]);

    let first = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap();
    let second = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap();
    assert_ne!(first.correlation_id, second.correlation_id);

    let given = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads").correlation_id("caller-chosen"))
        .await
        .unwrap();
    assert_eq!(given.correlation_id, "caller-chosen");
    let requests = requests_to(&server, "/crm").await;
    assert_eq!(request_header(&requests[2], "x-correlation-id"), Some("caller-chosen"));
}

#[tokio::test]
async fn other_statuses_are_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    mount_leads(&server, ResponseTemplate::new(404).set_body_json(json!({"code": "INVALID_URL_PATTERN"}))).await;
    let gateway = gateway(&server, &[Service::Crm]);

    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "upstream_error");
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_retryable_later());
    assert!(err.to_string().contains("INVALID_URL_PATTERN"));
    assert_eq!(requests_to(&server, "/crm").await.len(), 1);
}

#[tokio::test]
async fn upstream_body_is_truncated() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    mount_leads(&server, ResponseTemplate::new(503).set_body_string("x".repeat(5000))).await;
    let gateway = gateway(&server, &[Service::Crm]);

    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap_err();

    match &err {
        GatewayError::Upstream { status, body, .. } => {
            assert_eq!(*status, 503);
            assert!(body.len() < 600);
            assert!(body.ends_with("..."));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
    assert!(err.is_retryable_later());
}

#[tokio::test]
async fn oversized_error_body_is_cut_short() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    mount_leads(&server, ResponseTemplate::new(500).set_body_string("e".repeat(1 << 20))).await;
    let gateway = gateway(&server, &[Service::Crm]);

    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap_err();

    match err {
        GatewayError::Upstream { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, format!("{}...", "e".repeat(512)));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn absolute_url_to_foreign_host_is_refused() {
    let server = MockServer::start().await;
    let foreign = MockServer::start().await;
    mount_token(&server, "SECRET-TOKEN", 3600).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&foreign)
        .await;
    let gateway = gateway(&server, &[Service::ProjectMgmt]);

    let err = gateway
        .projects()
        .request(&format!("{}/collect", foreign.uri()), RequestOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.category(), "config_error");
    assert!(foreign.received_requests().await.unwrap().is_empty());
    assert_eq!(token_requests(&server).await, 0);
}

#[tokio::test]
async fn absolute_url_on_service_host_is_allowed() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    Mock::given(method("GET"))
        .and(path("/crm/Leads"))
        .and(header("Authorization", "Zoho-oauthtoken A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server, &[Service::Crm]);

    let response = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, format!("{}/crm/Leads?page=2", server.uri())))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn deadline_aborts_slow_call() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    mount_leads(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({}))
            .set_delay(Duration::from_secs(2)),
    )
    .await;
    let gateway = gateway(&server, &[Service::Crm]);

    let started = Instant::now();
    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads").deadline(Duration::from_millis(200)))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "timeout");
    assert!(err.correlation_id().is_some());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn deadline_covers_backoff() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    mount_leads(&server, ResponseTemplate::new(429)).await;
    let resilience = ResilienceConfig::builder()
        .backoff_base(Duration::from_secs(5))
        .build();
    let gateway = gateway_with(&server, &[Service::Crm], resilience, Arc::new(SystemClock));

    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads").deadline(Duration::from_millis(300)))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "timeout");
    assert_eq!(requests_to(&server, "/crm").await.len(), 1);
}

#[tokio::test]
async fn invalid_json_is_transport_error() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    mount_leads(&server, ResponseTemplate::new(200).set_body_string("<html>maintenance</html>")).await;
    let gateway = gateway(&server, &[Service::Crm]);

    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "transport_error");
}

#[tokio::test]
async fn raw_and_empty_bodies() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    Mock::given(method("GET"))
        .and(path("/file-storage/download/f1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/crm/Leads/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let gateway = gateway(&server, &[Service::Crm, Service::FileStorage]);

    let raw = gateway
        .dispatch(RequestDescriptor::get(Service::FileStorage, "download/f1").raw_response())
        .await
        .unwrap();
    assert_eq!(raw.into_bytes().as_ref(), b"%PDF-1.7");

    let empty = gateway
        .dispatch(RequestDescriptor::delete(Service::Crm, "Leads/1"))
        .await
        .unwrap();
    assert_eq!(empty.status, 204);
    assert_eq!(empty.payload, Payload::Empty);
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    let mut region = region_for(&server);
    // Nothing listens on the discard port
    region
        .service_urls
        .insert(Service::Crm, "http://127.0.0.1:9/crm".to_string());
    let gateway = zoho_gateway::api::Gateway::new(registry_for(&[Service::Crm]), region, fast_resilience()).unwrap();

    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Crm, "Leads"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "transport_error");
    assert!(err.is_retryable_later());
}

#[tokio::test]
async fn missing_base_url_is_config_error_before_network() {
    let server = MockServer::start().await;
    mount_token(&server, "A", 3600).await;
    let mut region = region_for(&server);
    region.service_urls.remove(&Service::Accounting);
    let gateway =
        zoho_gateway::api::Gateway::new(registry_for(&[Service::Accounting]), region, fast_resilience()).unwrap();

    let err = gateway
        .dispatch(RequestDescriptor::get(Service::Accounting, "invoices"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "config_error");
    assert!(server.received_requests().await.unwrap().is_empty());
}
