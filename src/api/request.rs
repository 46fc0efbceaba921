//! Request descriptors and parsed responses
//!
//! A [`RequestDescriptor`] is built fresh for every logical call and is never
//! mutated by the dispatcher. Its correlation id is fixed at construction and
//! sent unchanged on every attempt.

use super::models::Service;
use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

/// How a 2xx body should be handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Raw,
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// Rebuilt on every attempt; the HTTP layer generates the boundary
    Multipart(MultipartForm),
}

#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub text_fields: Vec<(String, String)>,
    pub files: Vec<MultipartFile>,
}

#[derive(Debug, Clone)]
pub struct MultipartFile {
    pub field_name: String,
    pub file_name: String,
    pub content: Bytes,
    pub mime_type: Option<String>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.text_fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, file: MultipartFile) -> Self {
        self.files.push(file);
        self
    }

    /// Materialise a fresh `reqwest` form for one attempt
    pub fn to_form(&self) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &self.text_fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &self.files {
            let mut part = reqwest::multipart::Part::bytes(file.content.to_vec()).file_name(file.file_name.clone());
            if let Some(mime) = &file.mime_type {
                part = part.mime_str(mime)?;
            }
            form = form.part(file.field_name.clone(), part);
        }
        Ok(form)
    }
}

/// One logical call against a service
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub service: Service,
    pub method: Method,
    /// Path relative to the service base URL, or an absolute URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub response_format: ResponseFormat,
    pub correlation_id: String,
    /// Overrides the dispatcher's default retry budget
    pub retry_budget: Option<u32>,
    /// Overrides the dispatcher's default deadline for the whole call
    pub deadline: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(service: Service, method: Method, path: impl Into<String>) -> Self {
        Self {
            service,
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            response_format: ResponseFormat::Json,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            retry_budget: None,
            deadline: None,
        }
    }

    pub fn get(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::GET, path)
    }

    pub fn post(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::POST, path)
    }

    pub fn put(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::PUT, path)
    }

    pub fn patch(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::PATCH, path)
    }

    pub fn delete(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn raw_response(mut self) -> Self {
        self.response_format = ResponseFormat::Raw;
        self
    }

    /// Use a caller-supplied correlation id instead of a generated one
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = Some(budget);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Method and path, used in logs
    pub fn operation_name(&self) -> String {
        format!("{} /{}", self.method, self.path.trim_start_matches('/'))
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

/// Options for the generic passthrough adapters
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub response_format: ResponseFormat,
    pub correlation_id: Option<String>,
    pub retry_budget: Option<u32>,
    pub deadline: Option<Duration>,
}

impl RequestOptions {
    pub fn into_descriptor(self, service: Service, endpoint: &str) -> RequestDescriptor {
        let mut descriptor = RequestDescriptor::new(service, self.method.unwrap_or(Method::GET), endpoint);
        descriptor.query = self.query;
        descriptor.headers = self.headers;
        descriptor.body = self.body;
        descriptor.response_format = self.response_format;
        descriptor.retry_budget = self.retry_budget;
        descriptor.deadline = self.deadline;
        if let Some(id) = self.correlation_id {
            descriptor.correlation_id = id;
        }
        descriptor
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Raw(Bytes),
    Empty,
}

/// Parsed successful response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub correlation_id: String,
    /// Network attempts it took, including the first
    pub attempts: u32,
    pub payload: Payload,
}

impl ApiResponse {
    pub fn json(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// JSON body, or `null` for empty and raw bodies
    pub fn into_json(self) -> Value {
        match self.payload {
            Payload::Json(value) => value,
            Payload::Raw(_) | Payload::Empty => Value::Null,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self.payload {
            Payload::Raw(bytes) => bytes,
            Payload::Json(value) => Bytes::from(value.to_string()),
            Payload::Empty => Bytes::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_builder() {
        let descriptor = RequestDescriptor::post(Service::Crm, "/Leads/upsert")
            .header("X-Trace", "1")
            .query("trigger", "workflow")
            .json(json!({"data": []}))
            .retry_budget(1)
            .deadline(Duration::from_secs(5));

        assert_eq!(descriptor.method, Method::POST);
        assert_eq!(descriptor.operation_name(), "POST /Leads/upsert");
        assert!(descriptor.has_header("x-trace"));
        assert_eq!(descriptor.query, vec![("trigger".to_string(), "workflow".to_string())]);
        assert_eq!(descriptor.retry_budget, Some(1));
        assert!(matches!(descriptor.body, RequestBody::Json(_)));
    }

    #[test]
    fn test_generated_correlation_ids_are_unique() {
        let a = RequestDescriptor::get(Service::Crm, "/Leads");
        let b = RequestDescriptor::get(Service::Crm, "/Leads");
        assert_ne!(a.correlation_id, b.correlation_id);

        let c = RequestDescriptor::get(Service::Crm, "/Leads").correlation_id("fixed");
        assert_eq!(c.correlation_id, "fixed");
    }

    #[test]
    fn test_options_into_descriptor() {
        let options = RequestOptions {
            method: Some(Method::PUT),
            correlation_id: Some("given".to_string()),
            ..Default::default()
        };
        let descriptor = options.into_descriptor(Service::ProjectMgmt, "portal/1/projects/2/");
        assert_eq!(descriptor.method, Method::PUT);
        assert_eq!(descriptor.correlation_id, "given");

        let default = RequestOptions::default().into_descriptor(Service::Accounting, "items");
        assert_eq!(default.method, Method::GET);
    }

    #[test]
    fn test_response_accessors() {
        let response = ApiResponse {
            status: 200,
            correlation_id: "c".to_string(),
            attempts: 1,
            payload: Payload::Json(json!({"id": "1"})),
        };
        assert_eq!(response.json().unwrap()["id"], "1");
        assert_eq!(response.clone().into_json(), json!({"id": "1"}));

        let empty = ApiResponse {
            payload: Payload::Empty,
            ..response
        };
        assert_eq!(empty.into_json(), Value::Null);
    }

    #[test]
    fn test_multipart_form_builds_each_time() {
        let form = MultipartForm::new().text("parent_id", "abc").file(MultipartFile {
            field_name: "content".to_string(),
            file_name: "report.pdf".to_string(),
            content: Bytes::from_static(b"%PDF"),
            mime_type: Some("application/pdf".to_string()),
        });

        assert!(form.to_form().is_ok());
        assert!(form.to_form().is_ok());
    }
}
