//! Resilient request dispatcher
//!
//! Executes a [`RequestDescriptor`] against its service: resolves the base
//! URL, attaches the current access token and the call's correlation id,
//! sends, and classifies the response through the [`RetryPolicy`]. Only 401
//! and 429 are recovered from locally; everything else is returned at once.

use super::auth::AccessTokenSource;
use super::constants::{AUTH_SCHEME, headers};
use super::error::{GatewayError, GatewayResult, MAX_ERROR_BODY_CHARS, truncate_body};
use super::models::Service;
use super::region::RegionResolver;
use super::request::{ApiResponse, Payload, RequestBody, RequestDescriptor, ResponseFormat};
use super::resilience::{
    ApiLogger, MetricsCollector, OperationContext, RecoveryAction, ResilienceConfig, RetryDecision, RetryKind,
    RetryPolicy,
};
use log::error;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-call bookkeeping shared between the attempt loop and the caller
#[derive(Debug, Default)]
struct AttemptStats {
    attempts: u32,
    last_status: Option<u16>,
    backoff_delays: Vec<Duration>,
}

#[derive(Clone)]
pub struct Dispatcher {
    http_client: reqwest::Client,
    resolver: Arc<RegionResolver>,
    tokens: Arc<dyn AccessTokenSource>,
    policy: RetryPolicy,
    default_deadline: Option<Duration>,
    logger: ApiLogger,
    metrics: MetricsCollector,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("region", &self.resolver.code())
            .field("default_budget", &self.policy.default_budget())
            .field("default_deadline", &self.default_deadline)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        http_client: reqwest::Client,
        resolver: Arc<RegionResolver>,
        tokens: Arc<dyn AccessTokenSource>,
        resilience: &ResilienceConfig,
    ) -> Self {
        Self {
            http_client,
            resolver,
            tokens,
            policy: RetryPolicy::new(&resilience.retry),
            default_deadline: resilience.call_timeout,
            logger: ApiLogger::new(resilience.monitoring.clone()),
            metrics: MetricsCollector::new(resilience.monitoring.clone()),
        }
    }

    /// Replace the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn resolver(&self) -> &RegionResolver {
        &self.resolver
    }

    /// Fail a 2xx response whose body a caller cannot use. The call was
    /// already recorded as a success, so it is logged and recounted as failed.
    pub fn reject_response(&self, service: Service, response: &ApiResponse, reason: impl Into<String>) -> GatewayError {
        let err = GatewayError::Upstream {
            service,
            status: response.status,
            body: truncate_body(&reason.into()),
            correlation_id: response.correlation_id.clone(),
        };
        error!(
            "{} response rejected [{}] ({}): {}",
            service,
            response.correlation_id,
            err.category(),
            err
        );
        self.metrics.record_rejected_response(service, err.category());
        err
    }

    /// Execute one logical call, retrying on 401/429 within budget and deadline
    pub async fn dispatch(&self, descriptor: RequestDescriptor) -> GatewayResult<ApiResponse> {
        let service = descriptor.service;
        let deadline = descriptor.deadline.or(self.default_deadline);
        let mut context = self
            .logger
            .start_operation(service, &descriptor.operation_name(), &descriptor.correlation_id);
        self.logger.add_metadata(
            &mut context,
            "retry_budget",
            json!(descriptor.retry_budget.unwrap_or(self.policy.default_budget())),
        );
        self.logger
            .add_metadata(&mut context, "deadline_ms", json!(deadline.map(|d| d.as_millis() as u64)));
        let mut stats = AttemptStats::default();

        let result = match deadline {
            Some(limit) => {
                match tokio::time::timeout(limit, self.run(&descriptor, &context, &mut stats)).await {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::Timeout {
                        service,
                        correlation_id: descriptor.correlation_id.clone(),
                        deadline_ms: limit.as_millis(),
                    }),
                }
            }
            None => self.run(&descriptor, &context, &mut stats).await,
        };

        let mut metrics = context.create_metrics(stats.attempts, stats.last_status, result.as_ref().err());
        metrics.backoff_delays = stats.backoff_delays;

        if let Err(err) = &result {
            self.logger.log_failure(&context, err);
        }
        self.logger.complete_operation(&context, &metrics);
        self.metrics.record_operation(service, &metrics);

        result
    }

    async fn run(
        &self,
        descriptor: &RequestDescriptor,
        context: &OperationContext,
        stats: &mut AttemptStats,
    ) -> GatewayResult<ApiResponse> {
        let service = descriptor.service;
        let budget = descriptor.retry_budget.unwrap_or(self.policy.default_budget());
        let mut retries_used = 0u32;

        loop {
            let url = self.resolver.request_url(service, &descriptor.path)?;
            let token = self.tokens.access_token(service).await?;

            stats.attempts += 1;
            let attempt = stats.attempts;

            let (request, logged_headers) = self.build_request(descriptor, &url, &token)?;
            self.logger
                .log_request(context, attempt, descriptor.method.as_str(), &url, &logged_headers);

            let started = Instant::now();
            let response = request
                .send()
                .await
                .map_err(|e| transport_error(descriptor, e))?;
            let status = response.status().as_u16();
            stats.last_status = Some(status);
            self.logger.log_response(context, attempt, status, started.elapsed());

            if response.status().is_success() {
                return self.parse_success(descriptor, response, attempt).await;
            }

            match self.policy.decide(status, retries_used, budget.saturating_sub(retries_used)) {
                RetryDecision::Retry { kind, action, delay } => {
                    let reason = match kind {
                        RetryKind::Authentication => "authentication rejected",
                        RetryKind::RateLimit => "rate limited",
                    };
                    self.logger.log_retry(context, attempt + 1, reason, delay);

                    match action {
                        RecoveryAction::InvalidateToken => {
                            self.tokens.invalidate(service, &token).await;
                        }
                        RecoveryAction::Backoff => {
                            stats.backoff_delays.push(delay);
                            tokio::time::sleep(delay).await;
                        }
                    }
                    retries_used += 1;
                }
                RetryDecision::Exhausted(RetryKind::Authentication) => {
                    return Err(GatewayError::AuthenticationFailed {
                        service,
                        correlation_id: descriptor.correlation_id.clone(),
                        attempts: attempt,
                    });
                }
                RetryDecision::Exhausted(RetryKind::RateLimit) => {
                    return Err(GatewayError::RateLimited {
                        service,
                        correlation_id: descriptor.correlation_id.clone(),
                        attempts: attempt,
                    });
                }
                RetryDecision::NotRetryable => {
                    let body = read_error_body(response).await;
                    return Err(GatewayError::Upstream {
                        service,
                        status,
                        body: truncate_body(&body),
                        correlation_id: descriptor.correlation_id.clone(),
                    });
                }
            }
        }
    }

    /// Build one attempt. Headers are derived from the descriptor every time
    /// and never carried over from a previous attempt.
    fn build_request(
        &self,
        descriptor: &RequestDescriptor,
        url: &str,
        token: &str,
    ) -> GatewayResult<(reqwest::RequestBuilder, HashMap<String, String>)> {
        let mut logged_headers = HashMap::new();
        let mut builder = self.http_client.request(descriptor.method.clone(), url);

        if !descriptor.query.is_empty() {
            builder = builder.query(&descriptor.query);
        }

        if !descriptor.has_header(headers::ACCEPT) {
            builder = builder.header(headers::ACCEPT, headers::CONTENT_TYPE_JSON);
            logged_headers.insert(headers::ACCEPT.to_string(), headers::CONTENT_TYPE_JSON.to_string());
        }

        for (name, value) in &descriptor.headers {
            if name.eq_ignore_ascii_case(headers::AUTHORIZATION) || name.eq_ignore_ascii_case(headers::X_CORRELATION_ID) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
            logged_headers.insert(name.clone(), value.clone());
        }

        let authorization = format!("{} {}", AUTH_SCHEME, token);
        builder = builder
            .header(headers::AUTHORIZATION, authorization.as_str())
            .header(headers::X_CORRELATION_ID, descriptor.correlation_id.as_str());
        logged_headers.insert(headers::AUTHORIZATION.to_string(), authorization);
        logged_headers.insert(headers::X_CORRELATION_ID.to_string(), descriptor.correlation_id.clone());

        builder = match &descriptor.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::Multipart(form) => {
                let form = form.to_form().map_err(|e| transport_error(descriptor, e))?;
                builder.multipart(form)
            }
        };

        Ok((builder, logged_headers))
    }

    async fn parse_success(
        &self,
        descriptor: &RequestDescriptor,
        response: reqwest::Response,
        attempts: u32,
    ) -> GatewayResult<ApiResponse> {
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(descriptor, e))?;

        let payload = if bytes.is_empty() {
            Payload::Empty
        } else {
            match descriptor.response_format {
                ResponseFormat::Raw => Payload::Raw(bytes),
                ResponseFormat::Json => {
                    let value = serde_json::from_slice(&bytes).map_err(|e| GatewayError::Transport {
                        service: descriptor.service,
                        correlation_id: descriptor.correlation_id.clone(),
                        message: format!("invalid JSON body: {}", e),
                    })?;
                    Payload::Json(value)
                }
            }
        };

        Ok(ApiResponse {
            status,
            correlation_id: descriptor.correlation_id.clone(),
            attempts,
            payload,
        })
    }
}

/// Read just enough of an error body to fill the truncated diagnostic.
/// Four bytes per character covers any UTF-8 text.
async fn read_error_body(mut response: reqwest::Response) -> String {
    let limit = MAX_ERROR_BODY_CHARS * 4;
    let mut buffer = Vec::new();
    while buffer.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => buffer.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    buffer.truncate(limit);
    String::from_utf8_lossy(&buffer).into_owned()
}

fn transport_error(descriptor: &RequestDescriptor, error: reqwest::Error) -> GatewayError {
    GatewayError::Transport {
        service: descriptor.service,
        correlation_id: descriptor.correlation_id.clone(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Service;
    use crate::api::region::builtin_region;
    use async_trait::async_trait;

    struct StaticToken;

    #[async_trait]
    impl AccessTokenSource for StaticToken {
        async fn access_token(&self, _service: Service) -> GatewayResult<String> {
            Ok("static-token".to_string())
        }

        async fn invalidate(&self, _service: Service, _rejected: &str) {}
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            reqwest::Client::new(),
            Arc::new(RegionResolver::new(builtin_region("eu").unwrap())),
            Arc::new(StaticToken),
            &ResilienceConfig::default(),
        )
    }

    #[test]
    fn test_build_request_sets_gateway_headers() {
        let descriptor = RequestDescriptor::post(Service::Crm, "Leads")
            .header("Authorization", "Bearer smuggled")
            .header("X-Correlation-ID", "other")
            .json(json!({"data": []}))
            .correlation_id("corr-1");

        let (builder, _) = dispatcher()
            .build_request(&descriptor, "https://www.zohoapis.eu/crm/v2/Leads", "tok")
            .unwrap();
        let request = builder.build().unwrap();
        let headers = request.headers();

        let auth: Vec<_> = headers.get_all("authorization").iter().collect();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0], "Zoho-oauthtoken tok");
        assert_eq!(headers.get("x-correlation-id").unwrap(), "corr-1");
        assert_eq!(headers.get("accept").unwrap(), "application/json");
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_caller_accept_header_wins() {
        let descriptor = RequestDescriptor::get(Service::FileStorage, "download/1")
            .header("Accept", "application/octet-stream")
            .raw_response();

        let (builder, _) = dispatcher()
            .build_request(&descriptor, "https://www.zohoapis.eu/workdrive/api/v1/download/1", "tok")
            .unwrap();
        let request = builder.build().unwrap();

        let accept: Vec<_> = request.headers().get_all("accept").iter().collect();
        assert_eq!(accept, vec!["application/octet-stream"]);
    }

    #[test]
    fn test_fresh_headers_per_attempt() {
        let dispatcher = dispatcher();
        let descriptor = RequestDescriptor::get(Service::Crm, "Leads");

        let (first, _) = dispatcher.build_request(&descriptor, "https://x/Leads", "old").unwrap();
        let (second, _) = dispatcher.build_request(&descriptor, "https://x/Leads", "new").unwrap();
        let first = first.build().unwrap();
        let second = second.build().unwrap();

        assert_eq!(first.headers().get("authorization").unwrap(), "Zoho-oauthtoken old");
        assert_eq!(second.headers().get_all("authorization").iter().count(), 1);
        assert_eq!(second.headers().get("authorization").unwrap(), "Zoho-oauthtoken new");
        assert_eq!(
            first.headers().get("x-correlation-id"),
            second.headers().get("x-correlation-id")
        );
    }

    #[test]
    fn test_debug_hides_token_source() {
        let rendered = format!("{:?}", dispatcher());
        assert!(rendered.starts_with("Dispatcher"));
        assert!(rendered.contains("eu"));
        assert!(!rendered.contains("static-token"));
    }

    #[test]
    fn test_reject_response_is_upstream_and_recounted() {
        use crate::api::resilience::OperationMetrics;

        let dispatcher = dispatcher();
        dispatcher.metrics().record_operation(
            Service::Crm,
            &OperationMetrics {
                duration: Duration::from_millis(5),
                attempts: 1,
                success: true,
                status_code: Some(200),
                error_category: None,
                backoff_delays: vec![],
            },
        );
        let response = ApiResponse {
            status: 200,
            correlation_id: "corr-9".to_string(),
            attempts: 1,
            payload: Payload::Empty,
        };

        let err = dispatcher.reject_response(Service::Crm, &response, "response has no '/data'");
        assert_eq!(err.category(), "upstream_error");
        assert_eq!(err.status(), Some(200));
        assert_eq!(err.correlation_id(), Some("corr-9"));
        assert!(!err.is_retryable_later());

        let crm = dispatcher.metrics().service_metrics(Service::Crm).unwrap();
        assert_eq!(crm.successful_calls, 0);
        assert_eq!(crm.failed_calls, 1);
        assert_eq!(crm.error_categories["upstream_error"], 1);
    }

    #[test]
    fn test_multipart_leaves_boundary_to_http_layer() {
        use crate::api::request::{MultipartFile, MultipartForm};

        let descriptor = RequestDescriptor::post(Service::FileStorage, "upload").multipart(
            MultipartForm::new().text("parent_id", "p1").file(MultipartFile {
                field_name: "content".to_string(),
                file_name: "a.txt".to_string(),
                content: bytes::Bytes::from_static(b"hello"),
                mime_type: None,
            }),
        );

        let (builder, _) = dispatcher()
            .build_request(&descriptor, "https://x/upload", "tok")
            .unwrap();
        let request = builder.build().unwrap();
        let content_type = request.headers().get("content-type").unwrap().to_str().unwrap();

        assert!(content_type.starts_with("multipart/form-data; boundary="));
    }
}
