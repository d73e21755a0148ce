use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::catalog::{CatalogDocument, CatalogError, Project, ProjectCatalog, ProjectEdit};

/// Catalog kept in a pretty-printed JSON file
///
/// Every update re-reads the file, edits it and writes it back whole. The
/// internal mutex serializes updates made through this instance only.
pub struct JsonFileCatalog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<CatalogDocument, CatalogError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            error!("Failed to read catalog {}: {}", self.path.display(), e);
            CatalogError::Unavailable(e.to_string())
        })?;

        serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse catalog {}: {}", self.path.display(), e);
            CatalogError::Unavailable(e.to_string())
        })
    }

    async fn write(&self, document: &CatalogDocument) -> Result<(), CatalogError> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| CatalogError::WriteFailed(e.to_string()))?;

        tokio::fs::write(&self.path, json).await.map_err(|e| {
            error!("Failed to write catalog {}: {}", self.path.display(), e);
            CatalogError::WriteFailed(e.to_string())
        })
    }
}

#[async_trait]
impl ProjectCatalog for JsonFileCatalog {
    async fn list(&self) -> Result<CatalogDocument, CatalogError> {
        self.read().await
    }

    async fn update(&self, code: &str, edit: ProjectEdit) -> Result<Project, CatalogError> {
        let _guard = self.write_lock.lock().await;

        let mut document = self.read().await?;
        let project = document
            .find_mut(code)
            .ok_or_else(|| CatalogError::NotFound(code.to_string()))?;

        edit(project)?;
        let updated = project.clone();

        self.write(&document).await?;
        debug!("Wrote catalog {}", self.path.display());
        info!("Project {} now has sensors {:?}", code, updated.sensors);

        Ok(updated)
    }
}
