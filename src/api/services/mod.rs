//! Service adapters
//!
//! Thin, stateless request shapers. Each operation builds one
//! [`RequestDescriptor`](super::request::RequestDescriptor), hands it to the
//! dispatcher and decodes the interesting part of the response. Retrying and
//! error classification belong to the dispatcher alone.

pub mod accounting;
pub mod crm;
pub mod file_storage;
pub mod mailing_lists;
pub mod projects;
pub mod scheduling;

pub use accounting::{AccountingAdapter, AccountingContact, Invoice};
pub use crm::{CrmAdapter, FieldMeta, Lead, UpsertOutcome};
pub use file_storage::{FileStorageAdapter, Resource, UploadFile, UploadedFile};
pub use mailing_lists::{MailingListsAdapter, SubscribeOutcome, Subscriber};
pub use projects::{Portal, Project, ProjectsAdapter};
pub use scheduling::{AppointmentRequest, BookingConfirmation, Customer, SchedulingAdapter};

use super::dispatcher::Dispatcher;
use super::error::GatewayResult;
use super::models::Service;
use super::request::ApiResponse;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Decode the value at a JSON pointer of a successful response. An empty
/// pointer decodes the whole body. A body without that value is rejected
/// through the dispatcher so the failure is logged and counted.
pub(crate) fn extract<T: DeserializeOwned>(
    dispatcher: &Dispatcher,
    service: Service,
    response: &ApiResponse,
    pointer: &str,
) -> GatewayResult<T> {
    let Some(value) = response.json().and_then(|body| body.pointer(pointer)) else {
        let reason = if pointer.is_empty() {
            "response has no JSON body".to_string()
        } else {
            format!("response has no '{}'", pointer)
        };
        return Err(dispatcher.reject_response(service, response, reason));
    };

    T::deserialize(value).map_err(|e| {
        dispatcher.reject_response(service, response, format!("unexpected shape at '{}': {}", pointer, e))
    })
}

/// Percent-encode one path segment
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
