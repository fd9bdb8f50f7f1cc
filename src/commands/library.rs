use super::{CommandError, Result, UPLOAD_FAILED};
use crate::api::models::UploadProgress;
use crate::api::ApiClient;
use crate::db::models::{Document, NewDocument};
use crate::doc_processor;
use crate::store::DocumentStore;
use std::path::Path;
use tracing::{error, info};

/// One row of the library listing.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub document: Document,
    pub message_count: usize,
}

pub const NO_DOCUMENTS: &str = "No documents yet";
pub const NO_MATCHES: &str = "No documents found";

/// Documents in upload order. A non-blank `search` keeps only names that
/// contain it, ignoring case.
pub fn list_documents(store: &DocumentStore, search: Option<&str>) -> Vec<LibraryEntry> {
    let needle = search
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);
    store
        .documents()
        .iter()
        .filter(|doc| match &needle {
            Some(q) => doc.name.to_lowercase().contains(q.as_str()),
            None => true,
        })
        .map(|doc| LibraryEntry {
            document: doc.clone(),
            message_count: store.message_count(&doc.id),
        })
        .collect()
}

/// What to show when [`list_documents`] returns nothing.
pub fn empty_listing_message(search: Option<&str>) -> &'static str {
    match search.map(str::trim) {
        Some(q) if !q.is_empty() => NO_MATCHES,
        _ => NO_DOCUMENTS,
    }
}

/// Validates the file, uploads it, and records it only once the server has
/// accepted it. A rejected file never reaches the network.
pub async fn upload_document<F>(
    store: &mut DocumentStore,
    client: &ApiClient,
    file_path: &Path,
    max_upload_mb: u64,
    on_progress: F,
) -> Result<Document>
where
    F: Fn(UploadProgress) + Send + 'static,
{
    let file = doc_processor::load_upload(file_path, max_upload_mb)?;
    let name = file.name.clone();
    let size = file.bytes.len() as u64;

    let response = match client.upload_document(file, on_progress).await {
        Ok(response) => response,
        Err(e) => {
            error!(name = %name, error = %e, "upload failed");
            let message = e.detail().unwrap_or(UPLOAD_FAILED).to_string();
            return Err(CommandError::Upload(message));
        }
    };

    let doc = store.add_document(NewDocument {
        name,
        size: Some(size),
        document_id: response.document_id,
        page_count: response.page_count,
    })?;
    Ok(doc)
}

/// With a client, the server collection is deleted first and the local
/// record only goes once that succeeds.
pub async fn remove_document(
    store: &mut DocumentStore,
    remote: Option<&ApiClient>,
    doc_id: &str,
) -> Result<Document> {
    let doc = store
        .get_document(doc_id)
        .cloned()
        .ok_or_else(|| CommandError::NotFound(doc_id.to_string()))?;

    if let Some(client) = remote {
        client.delete_document(&doc.document_id).await?;
    }
    store.remove_document(doc_id)?;
    info!(id = %doc.id, remote = remote.is_some(), "document deleted");
    Ok(doc)
}

pub async fn document_info(
    store: &DocumentStore,
    client: &ApiClient,
    doc_id: &str,
) -> Result<serde_json::Value> {
    let doc = store
        .get_document(doc_id)
        .ok_or_else(|| CommandError::NotFound(doc_id.to_string()))?;
    Ok(client.get_document_info(&doc.document_id).await?)
}
