//! Project management adapter

use super::{extract, segment};
use crate::api::dispatcher::Dispatcher;
use crate::api::error::GatewayResult;
use crate::api::models::Service;
use crate::api::request::{ApiResponse, RequestDescriptor, RequestOptions};
use serde::Deserialize;
use serde_json::{Map, Value};

const SERVICE: Service = Service::ProjectMgmt;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Portal {
    pub id_string: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Project {
    pub id_string: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProjectsAdapter<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> ProjectsAdapter<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn list_portals(&self) -> GatewayResult<Vec<Portal>> {
        let response = self.dispatcher.dispatch(RequestDescriptor::get(SERVICE, "portals/")).await?;
        extract(self.dispatcher, SERVICE, &response, "/portals")
    }

    pub async fn list_projects(&self, portal: &str) -> GatewayResult<Vec<Project>> {
        let path = format!("portal/{}/projects/", segment(portal));
        let response = self.dispatcher.dispatch(RequestDescriptor::get(SERVICE, path)).await?;
        extract(self.dispatcher, SERVICE, &response, "/projects")
    }

    pub async fn get_project(&self, portal: &str, project_id: &str) -> GatewayResult<Project> {
        let path = format!("portal/{}/projects/{}/", segment(portal), segment(project_id));
        let response = self.dispatcher.dispatch(RequestDescriptor::get(SERVICE, path)).await?;

        // Single-project reads still come back as a one-element list
        let mut projects: Vec<Project> = extract(self.dispatcher, SERVICE, &response, "/projects")?;
        if projects.is_empty() {
            return Err(self.dispatcher.reject_response(
                SERVICE,
                &response,
                format!("project {} missing from response", project_id),
            ));
        }
        Ok(projects.swap_remove(0))
    }

    /// Passthrough for endpoints without a dedicated wrapper
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> GatewayResult<ApiResponse> {
        self.dispatcher.dispatch(options.into_descriptor(SERVICE, endpoint)).await
    }
}
