//! File storage adapter
//!
//! The storage API speaks JSON:API, so every call asks for
//! `application/vnd.api+json`. Uploads are multipart and go through the
//! dispatcher like everything else; the form is rebuilt for each attempt.

use super::{extract, segment};
use crate::api::constants::headers;
use crate::api::dispatcher::Dispatcher;
use crate::api::error::GatewayResult;
use crate::api::models::Service;
use crate::api::request::{MultipartFile, MultipartForm, RequestDescriptor};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value, json};

const SERVICE: Service = Service::FileStorage;
const JSON_API: &str = "application/vnd.api+json";

/// A JSON:API resource object
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Resource {
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Bytes,
    pub mime_type: Option<String>,
    /// Replace a same-named file instead of renaming the upload
    pub overwrite: bool,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            mime_type: None,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedFile {
    pub resource_id: String,
    #[serde(rename = "FileName", default)]
    pub file_name: Option<String>,
    #[serde(rename = "Permalink", default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UploadEntry {
    attributes: UploadedFile,
}

#[derive(Debug, Clone, Copy)]
pub struct FileStorageAdapter<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> FileStorageAdapter<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    fn get(&self, path: String) -> RequestDescriptor {
        RequestDescriptor::get(SERVICE, path).header(headers::ACCEPT, JSON_API)
    }

    pub async fn current_user(&self) -> GatewayResult<Resource> {
        let response = self.dispatcher.dispatch(self.get("users/me".to_string())).await?;
        extract(self.dispatcher, SERVICE, &response, "/data")
    }

    pub async fn list_workspaces(&self, team_id: &str) -> GatewayResult<Vec<Resource>> {
        let path = format!("teams/{}/workspaces", segment(team_id));
        let response = self.dispatcher.dispatch(self.get(path)).await?;
        extract(self.dispatcher, SERVICE, &response, "/data")
    }

    pub async fn create_folder(&self, parent_id: &str, name: &str) -> GatewayResult<Resource> {
        let body = json!({
            "data": {
                "attributes": { "name": name, "parent_id": parent_id },
                "type": "files"
            }
        });
        let descriptor = RequestDescriptor::post(SERVICE, "files")
            .header(headers::ACCEPT, JSON_API)
            .json(body);

        let response = self.dispatcher.dispatch(descriptor).await?;
        extract(self.dispatcher, SERVICE, &response, "/data")
    }

    /// Upload one file into a folder
    pub async fn upload_file(&self, parent_id: &str, file: UploadFile) -> GatewayResult<UploadedFile> {
        let form = MultipartForm::new()
            .text("filename", file.file_name.clone())
            .text("parent_id", parent_id)
            .text("override-name-exist", file.overwrite.to_string())
            .file(MultipartFile {
                field_name: "content".to_string(),
                file_name: file.file_name,
                content: file.content,
                mime_type: file.mime_type,
            });
        let descriptor = RequestDescriptor::post(SERVICE, "upload")
            .header(headers::ACCEPT, JSON_API)
            .multipart(form);

        let response = self.dispatcher.dispatch(descriptor).await?;
        let entry: UploadEntry = extract(self.dispatcher, SERVICE, &response, "/data/0")?;
        Ok(entry.attributes)
    }
}
