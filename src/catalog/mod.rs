//! Project catalog: monitoring projects and the sensors attached to them
//!
//! Stored as one JSON document that is read, edited and written back whole.

pub mod json_file;

pub use json_file::JsonFileCatalog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A monitoring project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique key
    pub project_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_location: Option<String>,
    /// Attached sensor names, in attach order
    #[serde(default)]
    pub sensors: Vec<String>,
    /// Fields this service does not interpret, kept on write-back
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            project_code: code.into(),
            project_name: None,
            project_info: None,
            project_location: None,
            sensors: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn has_sensor(&self, sensor: &str) -> bool {
        self.sensors.iter().any(|s| s == sensor)
    }

    pub fn attach_sensor(&mut self, sensor: &str) -> Result<(), CatalogError> {
        if self.has_sensor(sensor) {
            return Err(CatalogError::SensorExists(sensor.to_string()));
        }
        self.sensors.push(sensor.to_string());
        Ok(())
    }

    pub fn detach_sensor(&mut self, sensor: &str) -> Result<(), CatalogError> {
        if !self.has_sensor(sensor) {
            return Err(CatalogError::SensorMissing(sensor.to_string()));
        }
        self.sensors.retain(|s| s != sensor);
        Ok(())
    }
}

/// The whole stored document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogDocument {
    pub fn find(&self, code: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.project_code == code)
    }

    pub fn find_mut(&mut self, code: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.project_code == code)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("catalog write failed: {0}")]
    WriteFailed(String),

    #[error("project '{0}' not found")]
    NotFound(String),

    #[error("sensor name is required")]
    SensorRequired,

    #[error("sensor '{0}' already attached")]
    SensorExists(String),

    #[error("sensor '{0}' not attached")]
    SensorMissing(String),
}

impl CatalogError {
    /// Text returned to HTTP clients in `{ "message": ... }`
    pub fn client_message(&self) -> &'static str {
        match self {
            CatalogError::Unavailable(_) => "Error reading data",
            CatalogError::WriteFailed(_) => "Error updating file",
            CatalogError::NotFound(_) => "Project not found",
            CatalogError::SensorRequired => "Sensor name is required",
            CatalogError::SensorExists(_) => "Sensor already exists",
            CatalogError::SensorMissing(_) => "Sensor not found",
        }
    }
}

/// Edit applied to one project inside `update`
pub type ProjectEdit = Box<dyn FnOnce(&mut Project) -> Result<(), CatalogError> + Send>;

/// Read and read-modify-write access to the catalog
///
/// Implementations assume a single writer per store.
#[async_trait]
pub trait ProjectCatalog: Send + Sync {
    /// Whole document
    async fn list(&self) -> Result<CatalogDocument, CatalogError>;

    /// Apply `edit` to the project and persist; returns the edited project.
    /// Nothing is written if the edit fails.
    async fn update(&self, code: &str, edit: ProjectEdit) -> Result<Project, CatalogError>;

    async fn get(&self, code: &str) -> Result<Project, CatalogError> {
        self.list()
            .await?
            .find(code)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(code.to_string()))
    }

    async fn add_sensor(&self, code: &str, sensor: &str) -> Result<Project, CatalogError> {
        if sensor.is_empty() {
            return Err(CatalogError::SensorRequired);
        }
        let sensor = sensor.to_string();
        self.update(
            code,
            Box::new(move |project: &mut Project| project.attach_sensor(&sensor)),
        )
        .await
    }

    async fn remove_sensor(&self, code: &str, sensor: &str) -> Result<Project, CatalogError> {
        if sensor.is_empty() {
            return Err(CatalogError::SensorRequired);
        }
        let sensor = sensor.to_string();
        self.update(
            code,
            Box::new(move |project: &mut Project| project.detach_sensor(&sensor)),
        )
        .await
    }
}
