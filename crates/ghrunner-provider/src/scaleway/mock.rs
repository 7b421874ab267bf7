//! In-process stand-in for the Scaleway Instance API.
//!
//! Servers boot instantly: a `starting` server reads back as `running` on its
//! next fetch, and `terminate` removes it outright.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const ZONE: &str = "fr-par-1";

#[derive(Debug, Clone)]
pub struct MockServer {
    pub id: String,
    pub name: String,
    pub state: String,
    pub ip: Option<String>,
}

impl MockServer {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "state": self.state,
            "commercial_type": "DEV1-S",
            "public_ip": self.ip.as_ref().map(|ip| json!({"id": ip, "address": "51.15.0.1"})),
        })
    }
}

#[derive(Debug, Default)]
struct Inner {
    servers: Vec<MockServer>,
    calls: Vec<String>,
    user_data: Vec<String>,
    ip_failures: u32,
    next_id: u32,
}

/// Shared handle on the fake API state.
#[derive(Debug, Clone, Default)]
pub struct MockApi(Arc<Mutex<Inner>>);

impl MockApi {
    /// Fail the next `n` IP reservations with a 500.
    pub fn failing_ip_attach(self, n: u32) -> Self {
        self.0.lock().unwrap().ip_failures = n;
        self
    }

    pub fn with_server(self, name: &str, state: &str, ip: bool) -> Self {
        {
            let mut inner = self.0.lock().unwrap();
            inner.next_id += 1;
            let id = format!("srv-{}", inner.next_id);
            inner.servers.push(MockServer {
                ip: ip.then(|| format!("ip-{id}")),
                id,
                name: name.to_string(),
                state: state.to_string(),
            });
        }
        self
    }

    pub fn servers(&self) -> Vec<MockServer> {
        self.0.lock().unwrap().servers.clone()
    }

    pub fn user_data(&self) -> Vec<String> {
        self.0.lock().unwrap().user_data.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn exact(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Serve the API on a loopback port and return its base URL.
    pub async fn serve(&self) -> String {
        let routes = Router::new()
            .route("/servers", get(list_servers).post(create_server))
            .route("/servers/:id", get(get_server).delete(delete_server))
            .route("/servers/:id/action", post(server_action))
            .route("/servers/:id/user_data/cloud-init", patch(set_cloud_init))
            .route("/ips", post(create_ip))
            .with_state(self.clone());
        let app = Router::new().nest(&format!("/instance/v1/zones/{ZONE}"), routes);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn record(&self, call: String) -> std::sync::MutexGuard<'_, Inner> {
        let mut inner = self.0.lock().unwrap();
        inner.calls.push(call);
        inner
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"message": "resource not found"}))).into_response()
}

async fn list_servers(
    State(api): State<MockApi>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let name = query.get("name").cloned().unwrap_or_default();
    let inner = api.record(format!("GET /servers?name={name}"));
    let servers: Vec<Value> = inner
        .servers
        .iter()
        .filter(|s| s.name.contains(&name))
        .map(MockServer::to_json)
        .collect();
    Json(json!({ "servers": servers })).into_response()
}

async fn create_server(State(api): State<MockApi>, Json(body): Json<Value>) -> Response {
    let mut inner = api.record("POST /servers".to_string());
    inner.next_id += 1;
    let server = MockServer {
        id: format!("srv-{}", inner.next_id),
        name: body["name"].as_str().unwrap_or_default().to_string(),
        state: "stopped".to_string(),
        ip: None,
    };
    let out = server.to_json();
    inner.servers.push(server);
    (StatusCode::CREATED, Json(json!({ "server": out }))).into_response()
}

async fn get_server(State(api): State<MockApi>, Path(id): Path<String>) -> Response {
    let mut inner = api.record(format!("GET /servers/{id}"));
    let Some(server) = inner.servers.iter_mut().find(|s| s.id == id) else {
        return not_found();
    };
    if server.state == "starting" {
        server.state = "running".to_string();
    }
    Json(json!({ "server": server.to_json() })).into_response()
}

async fn delete_server(State(api): State<MockApi>, Path(id): Path<String>) -> Response {
    let mut inner = api.record(format!("DELETE /servers/{id}"));
    let before = inner.servers.len();
    inner.servers.retain(|s| s.id != id);
    if inner.servers.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn server_action(
    State(api): State<MockApi>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let action = body["action"].as_str().unwrap_or_default().to_string();
    let mut inner = api.record(format!("POST /servers/{id}/action {action}"));
    let Some(index) = inner.servers.iter().position(|s| s.id == id) else {
        return not_found();
    };
    match action.as_str() {
        "poweron" if inner.servers[index].state == "stopped" => {
            inner.servers[index].state = "starting".to_string();
        }
        "poweron" => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "server should be stopped"})),
            )
                .into_response();
        }
        "terminate" => {
            inner.servers.remove(index);
        }
        _ => return StatusCode::BAD_REQUEST.into_response(),
    }
    (StatusCode::ACCEPTED, Json(json!({"task": {"id": "task-1"}}))).into_response()
}

async fn set_cloud_init(State(api): State<MockApi>, Path(id): Path<String>, body: String) -> Response {
    let mut inner = api.record(format!("PATCH /servers/{id}/user_data/cloud-init"));
    if !inner.servers.iter().any(|s| s.id == id) {
        return not_found();
    }
    inner.user_data.push(body);
    StatusCode::NO_CONTENT.into_response()
}

async fn create_ip(State(api): State<MockApi>, Json(body): Json<Value>) -> Response {
    let mut inner = api.record("POST /ips".to_string());
    if inner.ip_failures > 0 {
        inner.ip_failures -= 1;
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "boom"})),
        )
            .into_response();
    }
    let server_id = body["server"].as_str().unwrap_or_default().to_string();
    let Some(server) = inner.servers.iter_mut().find(|s| s.id == server_id) else {
        return not_found();
    };
    let ip_id = format!("ip-{server_id}");
    server.ip = Some(ip_id.clone());
    (
        StatusCode::CREATED,
        Json(json!({"ip": {"id": ip_id, "address": "51.15.0.1"}})),
    )
        .into_response()
}
