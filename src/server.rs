//! HTTP surface: the `/ws` stream endpoint and the project catalog API

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, ws::WebSocketUpgrade, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::catalog::{CatalogDocument, CatalogError, JsonFileCatalog, Project, ProjectCatalog};
use crate::config::AppConfig;
use crate::input::{CachedSource, CsvFileSource, DatasetSource};
use crate::playback::SessionRegistry;
use crate::transport::{ws::serve_connection, ConnectionHub};

/// Shared handles given to every request
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub registry: Arc<SessionRegistry>,
    pub catalog: Arc<dyn ProjectCatalog>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        let csv = CsvFileSource::new(&config.dataset_path, config.channel_count);
        let source: Arc<dyn DatasetSource> = if config.cache_dataset {
            Arc::new(CachedSource::new(csv))
        } else {
            Arc::new(csv)
        };
        info!("Dataset source: {}", source.describe());

        let hub = Arc::new(ConnectionHub::new());
        let registry = Arc::new(SessionRegistry::new(
            source,
            hub.clone(),
            config.registry_config(),
        ));
        let catalog = Arc::new(JsonFileCatalog::new(&config.catalog_path));

        Self {
            hub,
            registry,
            catalog,
        }
    }
}

/// Build the application router
pub fn router(state: AppState, frontend_origin: &str) -> Result<Router> {
    let origin: HeaderValue = frontend_origin
        .parse()
        .with_context(|| format!("Invalid frontend origin '{}'", frontend_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/ws", get(stream_socket))
        .route("/api/projects", get(list_projects))
        .route("/api/projects/:id/add-sensor", post(add_sensor))
        .route("/api/projects/:id/remove-sensor", delete(remove_sensor))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn stream_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_connection(socket, state.hub, state.registry))
}

/// Body of the add/remove sensor requests
#[derive(Debug, Deserialize)]
struct SensorBody {
    #[serde(default)]
    sensor: Option<String>,
}

/// Sensor name from the request body; a missing or unreadable body counts as no name
fn requested_sensor(body: Result<Json<SensorBody>, JsonRejection>) -> String {
    match body {
        Ok(Json(body)) => body.sensor.unwrap_or_default(),
        Err(rejection) => {
            debug!("Unreadable sensor body: {}", rejection.body_text());
            String::new()
        }
    }
}

#[derive(Debug, Serialize)]
struct SensorChange {
    message: String,
    project: Project,
}

async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<CatalogDocument>, CatalogError> {
    Ok(Json(state.catalog.list().await?))
}

async fn add_sensor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SensorBody>, JsonRejection>,
) -> Result<Json<SensorChange>, CatalogError> {
    let sensor = requested_sensor(body);
    let project = state.catalog.add_sensor(&id, &sensor).await?;

    Ok(Json(SensorChange {
        message: format!("Sensor {} added successfully", sensor),
        project,
    }))
}

async fn remove_sensor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SensorBody>, JsonRejection>,
) -> Result<Json<SensorChange>, CatalogError> {
    let sensor = requested_sensor(body);
    let project = state.catalog.remove_sensor(&id, &sensor).await?;

    Ok(Json(SensorChange {
        message: format!("Sensor {} removed successfully", sensor),
        project,
    }))
}

impl CatalogError {
    pub fn status(&self) -> StatusCode {
        match self {
            CatalogError::Unavailable(_) | CatalogError::WriteFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::SensorRequired
            | CatalogError::SensorExists(_)
            | CatalogError::SensorMissing(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "message": self.client_message() });
        (self.status(), Json(body)).into_response()
    }
}
