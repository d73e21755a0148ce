use std::net::SocketAddr;
use std::path::PathBuf;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use sensor_replay::{router, AppConfig, AppState};

const CATALOG: &str = r#"{
  "projects": [
    { "projectCode": "A", "sensors": [] },
    { "projectCode": "B", "projectName": "Dam", "sensors": ["sensor2", "sensor5"] }
  ]
}"#;

struct TestServer {
    base: String,
    catalog_path: PathBuf,
    client: reqwest::Client,
    _dir: tempfile::TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn stored(&self) -> Value {
        serde_json::from_str(&std::fs::read_to_string(&self.catalog_path).unwrap()).unwrap()
    }
}

async fn spawn_server() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let dataset_path = dir.path().join("data.csv");
    let catalog_path = dir.path().join("projectData.json");
    std::fs::write(&dataset_path, "00:00,1,2,3\n").unwrap();
    std::fs::write(&catalog_path, CATALOG).unwrap();

    let config = AppConfig {
        dataset_path,
        catalog_path: catalog_path.clone(),
        channel_count: 3,
        ..AppConfig::default()
    };

    let app = router(AppState::from_config(&config), &config.frontend_origin).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        catalog_path,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

async fn status_and_body(response: reqwest::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap();
    (status, body)
}

#[tokio::test]
async fn test_list_projects() {
    let server = spawn_server().await;

    let response = server
        .client
        .get(server.url("/api/projects"))
        .send()
        .await
        .unwrap();
    let (status, body) = status_and_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, server.stored());
    assert_eq!(body["projects"][1]["projectName"], "Dam");
}

#[tokio::test]
async fn test_add_sensor_then_remove_it() {
    let server = spawn_server().await;

    let response = server
        .client
        .post(server.url("/api/projects/A/add-sensor"))
        .json(&json!({ "sensor": "sensor9" }))
        .send()
        .await
        .unwrap();
    let (status, body) = status_and_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Sensor sensor9 added successfully");
    assert_eq!(body["project"], json!({ "projectCode": "A", "sensors": ["sensor9"] }));
    assert_eq!(server.stored()["projects"][0]["sensors"], json!(["sensor9"]));

    let response = server
        .client
        .delete(server.url("/api/projects/B/remove-sensor"))
        .json(&json!({ "sensor": "sensor2" }))
        .send()
        .await
        .unwrap();
    let (status, body) = status_and_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Sensor sensor2 removed successfully");
    assert_eq!(body["project"]["sensors"], json!(["sensor5"]));
    assert_eq!(server.stored()["projects"][1]["sensors"], json!(["sensor5"]));
}

#[tokio::test]
async fn test_unknown_project_is_not_found() {
    let server = spawn_server().await;

    let response = server
        .client
        .post(server.url("/api/projects/ZZ/add-sensor"))
        .json(&json!({ "sensor": "sensor1" }))
        .send()
        .await
        .unwrap();

    assert_eq!(
        status_and_body(response).await,
        (StatusCode::NOT_FOUND, json!({ "message": "Project not found" }))
    );
}

#[tokio::test]
async fn test_duplicate_and_missing_sensor_are_bad_requests() {
    let server = spawn_server().await;
    let before = server.stored();

    let response = server
        .client
        .post(server.url("/api/projects/B/add-sensor"))
        .json(&json!({ "sensor": "sensor5" }))
        .send()
        .await
        .unwrap();
    assert_eq!(
        status_and_body(response).await,
        (StatusCode::BAD_REQUEST, json!({ "message": "Sensor already exists" }))
    );

    let response = server
        .client
        .delete(server.url("/api/projects/A/remove-sensor"))
        .json(&json!({ "sensor": "sensor5" }))
        .send()
        .await
        .unwrap();
    assert_eq!(
        status_and_body(response).await,
        (StatusCode::BAD_REQUEST, json!({ "message": "Sensor not found" }))
    );

    assert_eq!(server.stored(), before);
}

#[tokio::test]
async fn test_sensor_name_is_required() {
    let server = spawn_server().await;
    let required = (
        StatusCode::BAD_REQUEST,
        json!({ "message": "Sensor name is required" }),
    );

    // no body at all
    let response = server
        .client
        .delete(server.url("/api/projects/A/remove-sensor"))
        .send()
        .await
        .unwrap();
    assert_eq!(status_and_body(response).await, required);

    // JSON without the field
    let response = server
        .client
        .post(server.url("/api/projects/A/add-sensor"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(status_and_body(response).await, required);

    // empty name
    let response = server
        .client
        .post(server.url("/api/projects/A/add-sensor"))
        .json(&json!({ "sensor": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(status_and_body(response).await, required);

    // not JSON
    let response = server
        .client
        .post(server.url("/api/projects/A/add-sensor"))
        .header("content-type", "text/plain")
        .body("sensor=sensor1")
        .send()
        .await
        .unwrap();
    assert_eq!(status_and_body(response).await, required);
}
