use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Deserialize, Clone)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub document_id: String,
    #[serde(default)]
    pub chunks_created: u32,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessageRequest<'a> {
    pub message: &'a str,
    pub session_id: Option<&'a str>,
    pub context: Vec<ContextMessage>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "citations")]
    pub sources: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub collection_id: &'a str,
    pub query: &'a str,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default, deserialize_with = "citations")]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusMessage {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.loaded.min(self.total) * 100) / self.total) as u8
    }
}

/// Chat replies cite plain strings; query replies cite objects with the
/// chunk text under `content` and its origin under `metadata`. Both are
/// flattened to display strings.
fn citations<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|items| items.into_iter().map(citation_text).collect()))
}

fn citation_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Object(ref map) => {
            let source = map
                .get("metadata")
                .and_then(|m| m.get("source"))
                .and_then(|s| s.as_str());
            let page = map
                .get("metadata")
                .and_then(|m| m.get("page"))
                .and_then(|p| p.as_i64());
            match (source, page) {
                (Some(source), Some(page)) => format!("{} (p. {})", source, page),
                (Some(source), None) => source.to_string(),
                _ => map
                    .get("content")
                    .and_then(|c| c.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string()),
            }
        }
        other => other.to_string(),
    }
}
