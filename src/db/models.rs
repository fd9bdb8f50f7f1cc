use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field names are camelCase so records written by the web client load as-is.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    pub uploaded_at: String,
}

/// What the caller knows about a document before the store assigns id and time.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub size: Option<u64>,
    pub document_id: String,
    pub page_count: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub sources: Option<Vec<String>>,
    pub is_error: Option<bool>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
            is_error: None,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Option<Vec<String>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
            is_error: None,
        }
    }

    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: None,
            is_error: Some(true),
        }
    }
}

/// Document id -> messages in display order.
pub type Conversations = HashMap<String, Vec<Message>>;
