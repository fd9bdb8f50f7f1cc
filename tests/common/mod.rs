//! In-process stand-in for the RAG backend.

#![allow(dead_code)]

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use paper_chat_lib::api::ApiClient;
use paper_chat_lib::db::Database;
use paper_chat_lib::store::DocumentStore;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct Log {
    /// (file name, byte count)
    pub uploads: Vec<(String, usize)>,
    /// (message, session id)
    pub chats: Vec<(String, Option<String>)>,
    pub deleted: Vec<String>,
    pub cleared: Vec<String>,
    pub deleted_sessions: Vec<String>,
}

#[derive(Clone, Default)]
pub struct Backend {
    pub log: Arc<Mutex<Log>>,
}

impl Backend {
    pub fn log(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap()
    }
}

/// Starts the fake backend and returns a client pointed at it.
pub async fn spawn_backend() -> (ApiClient, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/v1/rag/upload", post(upload))
        .route("/api/v1/rag/query", post(query))
        .route("/api/v1/rag/collection/{id}", delete(delete_collection))
        .route("/api/v1/rag/collection/{id}/info", get(collection_info))
        .route("/api/chat/message", post(chat_message))
        .route("/api/chat/sessions", get(list_sessions))
        .route(
            "/api/chat/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/chat/sessions/{id}/clear", post(clear_session))
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (ApiClient::new(format!("http://{}/api", addr)), backend)
}

pub fn memory_store() -> DocumentStore {
    DocumentStore::open(Database::in_memory().unwrap()).unwrap()
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

/// `fail.pdf` is rejected with a detail; `crash.pdf` fails without one.
/// Otherwise the server id is `srv-<file stem>`.
async fn upload(State(backend): State<Backend>, mut multipart: Multipart) -> Response {
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.unwrap();
        match name.as_str() {
            "fail.pdf" => return detail(StatusCode::BAD_REQUEST, "Only PDF files are supported"),
            "crash.pdf" => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "").into_response();
            }
            _ => {}
        }
        backend.log().uploads.push((name.clone(), data.len()));
        let stem = name.trim_end_matches(".pdf");
        return Json(json!({
            "success": true,
            "message": "Document processed",
            "document_id": format!("srv-{}", stem),
            "chunks_created": 3,
            "document_ids": ["c1", "c2", "c3"],
            "page_count": 12
        }))
        .into_response();
    }
    detail(StatusCode::UNPROCESSABLE_ENTITY, "file is required")
}

/// Messages containing "explode" fail with a plain-text 500.
async fn chat_message(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    let message = body["message"].as_str().unwrap_or_default().to_string();
    let session_id = body["session_id"].as_str().map(str::to_string);
    backend.log().chats.push((message.clone(), session_id.clone()));

    if message.contains("explode") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    }
    Json(json!({
        "response": format!("answer to: {}", message),
        "session_id": session_id.unwrap_or_else(|| "generated".into()),
        "timestamp": "2024-05-01T12:00:00",
        "sources": ["paper.pdf"]
    }))
    .into_response()
}

async fn query(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "answer": format!("{} -> {}", body["collection_id"].as_str().unwrap_or_default(), body["query"].as_str().unwrap_or_default()),
        "question": body["query"],
        "sources": [{ "content": "chunk", "metadata": { "source": "paper.pdf", "page": 2 } }]
    }))
}

async fn collection_info(Path(id): Path<String>) -> Response {
    if id == "srv-gone" {
        return detail(StatusCode::NOT_FOUND, "Collection not found");
    }
    Json(json!({ "collection_id": id, "count": 42 })).into_response()
}

async fn delete_collection(State(backend): State<Backend>, Path(id): Path<String>) -> Json<Value> {
    backend.log().deleted.push(id.clone());
    Json(json!({ "message": format!("Collection {} deleted", id) }))
}

async fn list_sessions() -> Json<Value> {
    Json(json!(["s1", "s2"]))
}

/// Session `missing` does not exist; `garbled` answers 200 with a body that
/// is not JSON.
async fn get_session(Path(id): Path<String>) -> Response {
    if id == "missing" {
        return detail(StatusCode::NOT_FOUND, "Session not found");
    }
    if id == "garbled" {
        return (StatusCode::OK, "<html>maintenance</html>").into_response();
    }
    Json(json!({
        "session_id": id,
        "messages": [
            { "role": "user", "content": "hi", "timestamp": "2024-05-01T12:00:00" },
            { "role": "assistant", "content": "hello", "timestamp": "2024-05-01T12:00:01" }
        ],
        "created_at": "2024-05-01T12:00:00",
        "updated_at": "2024-05-01T12:00:01"
    }))
    .into_response()
}

async fn delete_session(State(backend): State<Backend>, Path(id): Path<String>) -> Json<Value> {
    let message = format!("Session {} deleted successfully", id);
    backend.log().deleted_sessions.push(id);
    Json(json!({ "message": message }))
}

/// Session `srv-missing` was never created server-side.
async fn clear_session(State(backend): State<Backend>, Path(id): Path<String>) -> Response {
    if id == "srv-missing" {
        return detail(StatusCode::NOT_FOUND, "Session not found");
    }
    backend.log().cleared.push(id);
    Json(json!({ "message": "Session cleared successfully" })).into_response()
}
