//! Mailing-list adapter

use super::extract;
use crate::api::dispatcher::Dispatcher;
use crate::api::error::GatewayResult;
use crate::api::models::Service;
use crate::api::request::RequestDescriptor;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const SERVICE: Service = Service::MailingLists;
const DEFAULT_SOURCE: &str = "zoho-gateway";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subscriber {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Additional contact fields, by display name
    pub fields: BTreeMap<String, String>,
}

impl Subscriber {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    /// The `contactinfo` JSON object
    pub fn contact_info(&self) -> Value {
        let mut info = Map::new();
        for (name, value) in &self.fields {
            info.insert(name.clone(), Value::from(value.as_str()));
        }
        info.insert("Contact Email".to_string(), Value::from(self.email.as_str()));
        if let Some(first_name) = &self.first_name {
            info.insert("First Name".to_string(), Value::from(first_name.as_str()));
        }
        if let Some(last_name) = &self.last_name {
            info.insert("Last Name".to_string(), Value::from(last_name.as_str()));
        }
        Value::Object(info)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscribeOutcome {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Value,
}

impl SubscribeOutcome {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MailingListsAdapter<'a> {
    dispatcher: &'a Dispatcher,
    source: &'a str,
}

impl<'a> MailingListsAdapter<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self {
            dispatcher,
            source: DEFAULT_SOURCE,
        }
    }

    /// Label recorded as the subscription's origin
    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = source;
        self
    }

    pub async fn subscribe(&self, list_key: &str, contact: &Subscriber) -> GatewayResult<SubscribeOutcome> {
        let descriptor = RequestDescriptor::post(SERVICE, "json/listsubscribe").form([
            ("listkey", list_key.to_string()),
            ("resfmt", "JSON".to_string()),
            ("source", self.source.to_string()),
            ("contactinfo", contact.contact_info().to_string()),
        ]);

        let response = self.dispatcher.dispatch(descriptor).await?;
        extract(self.dispatcher, SERVICE, &response, "")
    }
}
