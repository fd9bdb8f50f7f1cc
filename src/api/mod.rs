pub mod models;

use bytes::Bytes;
use models::{
    ChatMessageRequest, ChatReply, QueryRequest, QueryResponse, Session, StatusMessage,
    UploadProgress, UploadResponse,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Upload bodies are streamed in pieces of this size so progress can be reported.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// The server's own explanation, when it sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Api { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// A file to upload, already read into memory.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Client for the RAG backend. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Documents ──

    /// `on_progress` is called as the body is sent; the last call has
    /// `loaded == total`.
    pub async fn upload_document<F>(&self, file: UploadFile, on_progress: F) -> Result<UploadResponse>
    where
        F: Fn(UploadProgress) + Send + 'static,
    {
        let total = file.bytes.len() as u64;
        let mut rest = Bytes::from(file.bytes);
        let mut chunks = Vec::with_capacity(rest.len() / UPLOAD_CHUNK_SIZE + 1);
        while !rest.is_empty() {
            let n = rest.len().min(UPLOAD_CHUNK_SIZE);
            chunks.push(rest.split_to(n));
        }

        let mut loaded = 0u64;
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            loaded += chunk.len() as u64;
            on_progress(UploadProgress { loaded, total });
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file.name.clone())
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        info!(name = %file.name, bytes = total, "uploading document");
        let resp = self
            .client
            .post(self.url("/v1/rag/upload"))
            .multipart(form)
            .send()
            .await?;
        let data: UploadResponse = decode(resp).await?;
        info!(document_id = %data.document_id, chunks = data.chunks_created, "upload accepted");
        Ok(data)
    }

    pub async fn get_document_info(&self, collection_id: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(self.url(&format!("/v1/rag/collection/{}/info", collection_id)))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn delete_document(&self, collection_id: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .delete(self.url(&format!("/v1/rag/collection/{}", collection_id)))
            .send()
            .await?;
        let body = decode(resp).await?;
        info!(collection_id, "remote document deleted");
        Ok(body)
    }

    pub async fn query_documents(&self, collection_id: &str, query: &str) -> Result<QueryResponse> {
        let resp = self
            .client
            .post(self.url("/v1/rag/query"))
            .json(&QueryRequest {
                collection_id,
                query,
            })
            .send()
            .await?;
        decode(resp).await
    }

    // ── Chat ──

    pub async fn send_message(&self, session_id: Option<&str>, message: &str) -> Result<ChatReply> {
        debug!(?session_id, len = message.len(), "sending chat message");
        let resp = self
            .client
            .post(self.url("/chat/message"))
            .json(&ChatMessageRequest {
                message,
                session_id,
                context: Vec::new(),
            })
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        let resp = self.client.get(self.url("/chat/sessions")).send().await?;
        decode(resp).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        let resp = self
            .client
            .get(self.url(&format!("/chat/sessions/{}", session_id)))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<StatusMessage> {
        let resp = self
            .client
            .delete(self.url(&format!("/chat/sessions/{}", session_id)))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<StatusMessage> {
        let resp = self
            .client
            .post(self.url(&format!("/chat/sessions/{}/clear", session_id)))
            .send()
            .await?;
        decode(resp).await
    }
}

/// Turns a non-2xx response into [`ApiError::Api`], preferring the server's
/// `detail` field over the raw body.
async fn check(resp: Response) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    Err(ApiError::Api {
        status,
        message: detail_message(&text),
    })
}

/// Checks the status, then reads the whole body and decodes it as `T`. A
/// 2xx body that does not match becomes [`ApiError::Parse`].
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = check(resp).await?.bytes().await?;
    parse_body(&body)
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::Parse(e.to_string()))
}

fn detail_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
