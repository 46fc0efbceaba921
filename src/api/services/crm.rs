//! CRM adapter: leads and module metadata

use super::extract;
use crate::api::dispatcher::Dispatcher;
use crate::api::error::GatewayResult;
use crate::api::models::Service;
use crate::api::request::{Payload, RequestDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const SERVICE: Service = Service::Crm;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Last_Name", default)]
    pub last_name: String,
    #[serde(rename = "First_Name", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "Company", skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(rename = "Phone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "Lead_Source", skip_serializing_if = "Option::is_none")]
    pub lead_source: Option<String>,
    /// Any other field, by API name
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Lead {
    pub fn new(last_name: impl Into<String>) -> Self {
        Self {
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, api_name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(api_name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordDetails {
    pub id: Option<String>,
}

/// Per-record result of an upsert
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpsertOutcome {
    pub code: String,
    pub status: String,
    #[serde(default)]
    pub message: String,
    /// `insert` or `update`
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub duplicate_field: Option<String>,
    #[serde(default)]
    pub details: RecordDetails,
}

impl UpsertOutcome {
    pub fn id(&self) -> Option<&str> {
        self.details.id.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldMeta {
    pub api_name: String,
    #[serde(default)]
    pub field_label: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Escape characters with meaning inside a search criteria value
fn escape_criteria(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | ',' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Copy)]
pub struct CrmAdapter<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> CrmAdapter<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Insert or update a lead, matched on `duplicate_check_fields`
    pub async fn upsert_lead(&self, lead: &Lead, duplicate_check_fields: &[&str]) -> GatewayResult<UpsertOutcome> {
        let mut body = json!({ "data": [lead] });
        if !duplicate_check_fields.is_empty() {
            body["duplicate_check_fields"] = json!(duplicate_check_fields);
        }

        let response = self
            .dispatcher
            .dispatch(RequestDescriptor::post(SERVICE, "Leads/upsert").json(body))
            .await?;
        extract(self.dispatcher, SERVICE, &response, "/data/0")
    }

    /// Look a lead up by a unique field; `None` when nothing matches
    pub async fn find_lead_by_external_id(&self, field: &str, value: &str) -> GatewayResult<Option<Lead>> {
        let criteria = format!("({}:equals:{})", field, escape_criteria(value));
        let response = self
            .dispatcher
            .dispatch(RequestDescriptor::get(SERVICE, "Leads/search").query("criteria", criteria))
            .await?;

        // No match comes back as 204
        if matches!(response.payload, Payload::Empty) {
            return Ok(None);
        }
        let mut leads: Vec<Lead> = extract(self.dispatcher, SERVICE, &response, "/data")?;
        Ok(if leads.is_empty() { None } else { Some(leads.swap_remove(0)) })
    }

    /// Field metadata of a module (`Leads`, `Contacts`, ...)
    pub async fn list_fields(&self, module: &str) -> GatewayResult<Vec<FieldMeta>> {
        let response = self
            .dispatcher
            .dispatch(RequestDescriptor::get(SERVICE, "settings/fields").query("module", module))
            .await?;
        extract(self.dispatcher, SERVICE, &response, "/fields")
    }
}
