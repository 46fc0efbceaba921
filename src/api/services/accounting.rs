//! Accounting adapter. Every call is scoped to an organization id.

use super::{extract, segment};
use crate::api::dispatcher::Dispatcher;
use crate::api::error::GatewayResult;
use crate::api::models::Service;
use crate::api::request::{ApiResponse, RequestDescriptor, RequestOptions};
use serde::Deserialize;
use serde_json::{Map, Value};

const SERVICE: Service = Service::Accounting;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountingContact {
    pub contact_id: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct AccountingAdapter<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> AccountingAdapter<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    fn get(&self, path: String, organization_id: &str) -> RequestDescriptor {
        RequestDescriptor::get(SERVICE, path).query("organization_id", organization_id)
    }

    pub async fn list_invoices(&self, organization_id: &str) -> GatewayResult<Vec<Invoice>> {
        let response = self
            .dispatcher
            .dispatch(self.get("invoices".to_string(), organization_id))
            .await?;
        extract(self.dispatcher, SERVICE, &response, "/invoices")
    }

    pub async fn get_invoice(&self, organization_id: &str, invoice_id: &str) -> GatewayResult<Invoice> {
        let path = format!("invoices/{}", segment(invoice_id));
        let response = self.dispatcher.dispatch(self.get(path, organization_id)).await?;
        extract(self.dispatcher, SERVICE, &response, "/invoice")
    }

    pub async fn list_contacts(&self, organization_id: &str) -> GatewayResult<Vec<AccountingContact>> {
        let response = self
            .dispatcher
            .dispatch(self.get("contacts".to_string(), organization_id))
            .await?;
        extract(self.dispatcher, SERVICE, &response, "/contacts")
    }

    /// Passthrough for endpoints without a dedicated wrapper. The caller
    /// supplies `organization_id` in the options' query.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> GatewayResult<ApiResponse> {
        self.dispatcher.dispatch(options.into_descriptor(SERVICE, endpoint)).await
    }
}
