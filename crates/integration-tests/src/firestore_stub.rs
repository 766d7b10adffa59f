//! In-process stand-in for the Firestore REST endpoints the channel calls:
//! document create, field-masked patch and `runQuery`. Errors come back in
//! Firestore's JSON envelope so the channel's classification is exercised.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{patch, post};
use axum::{Json, Router};
use domains::MessageId;
use secrecy::SecretString;
use serde_json::{json, Value};
use storage_adapters::FirestoreConfig;
use tokio::task::JoinHandle;

pub const PROJECT: &str = "workchat";
pub const API_KEY: &str = "stub-key";
const DATABASE: &str = "(default)";

#[derive(Default)]
struct StubState {
    /// Document id to its `fields` object.
    documents: BTreeMap<String, Value>,
    deny_all: bool,
    deny_patch: HashSet<String>,
    query_delay: Option<Duration>,
    queries: usize,
}

type SharedState = Arc<Mutex<StubState>>;
type Params = Query<HashMap<String, String>>;

fn lock(state: &SharedState) -> MutexGuard<'_, StubState> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}

pub struct FirestoreStub {
    addr: SocketAddr,
    state: SharedState,
    server: JoinHandle<()>,
}

impl FirestoreStub {
    pub async fn start() -> Self {
        let state = SharedState::default();
        let app = Router::new()
            .route(
                "/v1/projects/{project}/databases/{database}/documents/messages",
                post(create_document),
            )
            .route(
                "/v1/projects/{project}/databases/{database}/documents/messages/{id}",
                patch(update_document),
            )
            .route(
                "/v1/projects/{project}/databases/{database}/documents:runQuery",
                post(run_query),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, state, server }
    }

    /// Channel settings pointing at this stub. Polling is effectively off;
    /// tests that rely on it lower `poll_interval`.
    pub fn config(&self) -> FirestoreConfig {
        let mut config = FirestoreConfig::new(PROJECT, SecretString::from(API_KEY.to_string()));
        config.base_url = format!("http://{}/v1", self.addr);
        config.poll_interval = Duration::from_secs(3600);
        config.request_timeout = Some(Duration::from_secs(5));
        config
    }

    /// Every request answers 403, as with locked-down security rules.
    pub fn deny_all(&self) {
        lock(&self.state).deny_all = true;
    }

    pub fn deny_updates_to(&self, id: &MessageId) {
        lock(&self.state).deny_patch.insert(id.as_str().to_string());
    }

    /// Queries read the documents first, then wait this long before answering.
    pub fn delay_queries(&self, delay: Duration) {
        lock(&self.state).query_delay = Some(delay);
    }

    pub fn query_count(&self) -> usize {
        lock(&self.state).queries
    }

    pub fn document_count(&self) -> usize {
        lock(&self.state).documents.len()
    }

    pub fn is_read(&self, id: &MessageId) -> Option<bool> {
        lock(&self.state)
            .documents
            .get(id.as_str())
            .map(|fields| fields["read"]["booleanValue"].as_bool().unwrap_or(false))
    }
}

impl Drop for FirestoreStub {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = json!({
        "error": { "code": status.as_u16(), "message": message.into(), "status": code }
    });
    (status, Json(body)).into_response()
}

fn reject(state: &StubState, params: &HashMap<String, String>, database: &str) -> Option<Response> {
    if params.get("key").map(String::as_str) != Some(API_KEY) {
        return Some(error(
            StatusCode::BAD_REQUEST,
            "INVALID_ARGUMENT",
            "API key not valid. Please pass a valid API key.",
        ));
    }
    if database != DATABASE {
        return Some(error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("The database {database} does not exist for project {PROJECT}"),
        ));
    }
    if state.deny_all {
        return Some(error(
            StatusCode::FORBIDDEN,
            "PERMISSION_DENIED",
            "Missing or insufficient permissions.",
        ));
    }
    None
}

fn document(project: &str, database: &str, id: &str, fields: &Value) -> Value {
    json!({
        "name": format!("projects/{project}/databases/{database}/documents/messages/{id}"),
        "fields": fields,
    })
}

fn timestamp(fields: &Value) -> i64 {
    fields["timestamp"]["integerValue"]
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default()
}

async fn create_document(
    State(state): State<SharedState>,
    Path((project, database)): Path<(String, String)>,
    Query(params): Params,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    if let Some(rejection) = reject(&state, &params, &database) {
        return rejection;
    }
    let Some(id) = params.get("documentId").cloned() else {
        return error(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", "documentId is required");
    };
    if state.documents.contains_key(&id) {
        return error(
            StatusCode::CONFLICT,
            "ALREADY_EXISTS",
            format!("Document already exists: messages/{id}"),
        );
    }
    let fields = body.get("fields").cloned().unwrap_or_else(|| json!({}));
    let created = document(&project, &database, &id, &fields);
    state.documents.insert(id, fields);
    Json(created).into_response()
}

async fn update_document(
    State(state): State<SharedState>,
    Path((project, database, id)): Path<(String, String, String)>,
    Query(params): Params,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    if let Some(rejection) = reject(&state, &params, &database) {
        return rejection;
    }
    if state.deny_patch.contains(&id) {
        return error(
            StatusCode::FORBIDDEN,
            "PERMISSION_DENIED",
            "Missing or insufficient permissions.",
        );
    }
    let Some(fields) = state.documents.get_mut(&id) else {
        return error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("No document to update: projects/{project}/databases/{database}/documents/messages/{id}"),
        );
    };
    if let Some(path) = params.get("updateMask.fieldPaths") {
        fields[path.as_str()] = body["fields"][path.as_str()].clone();
    }
    Json(document(&project, &database, &id, fields)).into_response()
}

async fn run_query(
    State(state): State<SharedState>,
    Path((project, database)): Path<(String, String)>,
    Query(params): Params,
    Json(body): Json<Value>,
) -> Response {
    let (delay, items) = {
        let mut state = lock(&state);
        if let Some(rejection) = reject(&state, &params, &database) {
            return rejection;
        }
        state.queries += 1;

        let query = &body["structuredQuery"];
        let limit = query["limit"].as_u64().map_or(usize::MAX, |l| l as usize);
        let descending = query["orderBy"][0]["direction"] == "DESCENDING";

        let mut ordered: Vec<(&String, &Value)> = state.documents.iter().collect();
        ordered.sort_by_key(|(_, fields)| timestamp(fields));
        if descending {
            ordered.reverse();
        }
        let items: Vec<Value> = ordered
            .into_iter()
            .take(limit)
            .map(|(id, fields)| {
                json!({
                    "document": document(&project, &database, id, fields),
                    "readTime": "2024-05-01T08:00:00Z",
                })
            })
            .collect();
        (state.query_delay, items)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    Json(Value::Array(items)).into_response()
}
