//! Loopback stand-in for the remote contacts API

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use dcombine_common::config::{ApiConfig, HarvestConfig};
use dcombine_sync::services::{ApiClient, Harvester};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Canned response: status and JSON body
pub type Reply = (u16, Value);

#[derive(Clone, Default)]
pub struct MockState {
    replies: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
    requests: Arc<Mutex<Vec<(String, String, HashMap<String, String>)>>>,
}

impl MockState {
    /// Queue replies for `path`, served in order; the last one repeats
    pub fn queue(&self, path: &str, replies: Vec<Reply>) {
        self.replies
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .extend(replies);
    }

    /// `(method, path, query)` of every request received
    pub fn requests(&self) -> Vec<(String, String, HashMap<String, String>)> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, path: &str) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => (404, Value::Null),
        }
    }

    fn respond(&self, method: &str, path: &str, query: HashMap<String, String>) -> Response {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_string(), path.to_string(), query));
        let (status, body) = self.next_reply(&format!("{} {}", method, path));
        (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
    }
}

async fn get_contacts(State(state): State<MockState>, Query(q): Query<HashMap<String, String>>) -> Response {
    state.respond("GET", "/v2/contacts", q)
}

async fn post_contacts(
    State(state): State<MockState>,
    Query(q): Query<HashMap<String, String>>,
    Json(_body): Json<Value>,
) -> Response {
    state.respond("POST", "/v2/contacts", q)
}

async fn get_lists(State(state): State<MockState>, Query(q): Query<HashMap<String, String>>) -> Response {
    state.respond("GET", "/v2/lists", q)
}

/// Start the mock on an ephemeral port; returns its base URI
pub async fn start(state: MockState) -> String {
    let app = Router::new()
        .route("/v2/contacts", get(get_contacts).post(post_contacts))
        .route("/v2/lists", get(get_lists))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn api_config(base_uri: &str) -> ApiConfig {
    ApiConfig {
        base_uri: base_uri.to_string(),
        api_key: Some("test-key".to_string()),
        access_token: Some("test-token".to_string()),
    }
}

pub fn client(base_uri: &str) -> ApiClient {
    ApiClient::new(&api_config(base_uri)).unwrap()
}

pub fn harvester(base_uri: &str) -> Harvester {
    Harvester::new(client(base_uri), HarvestConfig::default())
}
