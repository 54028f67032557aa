use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config that needs no certificates or network
fn minimal_config(port: u16, dir: &TempDir) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[ticket_source]
base_url = "https://api.tickettailor.test/v1"
api_key = "sk_test_123"
event_id = "ev_1"

[storage]
root = "{}"

[sync]
enabled = false
channels = ["google_wallet"]

[google]
issuer_email = "issuer@hakuna.dev"
class_id = "hakuna.pass.class"
"#,
        port,
        dir.path().join("state.db").display(),
        dir.path().join("tickets").display(),
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_tailorpass"))
        .env("TAILORPASS_CONFIG", config_path)
        .env("RUST_LOG", "error")
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let port = get_available_port();
    let dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &dir));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let health = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);
    let body: serde_json::Value = health.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let metrics = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .unwrap();
    assert_eq!(metrics.status(), 200);
    assert!(metrics
        .text()
        .await
        .unwrap()
        .contains("tailorpass_http_requests_total"));

    // Database file is created on startup
    assert!(dir.path().join("state.db").exists());

    server.kill().await.ok();
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let dir = TempDir::new().unwrap();
    // Port 0 fails validation
    let config = write_config(&minimal_config(0, &dir));

    let mut server = spawn_server(config.path()).await;
    let status = timeout(Duration::from_secs(10), server.wait())
        .await
        .expect("Server did not exit")
        .unwrap();

    assert!(!status.success());
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let dir = TempDir::new().unwrap();

    let mut server = spawn_server(&dir.path().join("missing.toml")).await;
    let status = timeout(Duration::from_secs(10), server.wait())
        .await
        .expect("Server did not exit")
        .unwrap();

    assert!(!status.success());
}
