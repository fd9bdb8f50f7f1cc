use super::{CommandError, Result, SEND_FAILED};
use crate::api::models::{QueryResponse, Session, StatusMessage};
use crate::api::{ApiClient, ApiError};
use crate::db::models::{Message, NewMessage};
use crate::store::DocumentStore;
use tracing::{error, info, warn};

pub fn get_messages<'a>(store: &'a DocumentStore, doc_id: &str) -> Result<&'a [Message]> {
    if store.get_document(doc_id).is_none() {
        return Err(CommandError::NotFound(doc_id.to_string()));
    }
    Ok(store.get_conversation(doc_id))
}

/// Records the user message, asks the backend, and records its reply. A
/// failed request becomes an assistant message flagged `is_error`, so the
/// returned message is always the assistant's.
pub async fn send_message(
    store: &mut DocumentStore,
    client: &ApiClient,
    doc_id: &str,
    content: &str,
) -> Result<Message> {
    let content = content.trim();
    if content.is_empty() {
        return Err(CommandError::EmptyMessage);
    }
    // The server keys its chat session on the document it indexed.
    let session_id = store
        .get_document(doc_id)
        .map(|doc| doc.document_id.clone())
        .ok_or_else(|| CommandError::NotFound(doc_id.to_string()))?;

    store.add_message(doc_id, NewMessage::user(content))?;

    let reply = match client.send_message(Some(&session_id), content).await {
        Ok(reply) => NewMessage::assistant(reply.response, reply.sources),
        Err(e) => {
            error!(doc_id, error = %e, "failed to send message");
            NewMessage::assistant_error(SEND_FAILED)
        }
    };
    Ok(store.add_message(doc_id, reply)?)
}

/// Clears the local transcript. With a client, the server session is cleared
/// first; a session the server never created counts as already clear.
pub async fn clear_conversation(
    store: &mut DocumentStore,
    remote: Option<&ApiClient>,
    doc_id: &str,
) -> Result<()> {
    let session_id = store
        .get_document(doc_id)
        .map(|doc| doc.document_id.clone())
        .ok_or_else(|| CommandError::NotFound(doc_id.to_string()))?;

    if let Some(client) = remote {
        match client.clear_session(&session_id).await {
            Ok(_) => {}
            Err(ApiError::Api { status: 404, .. }) => {
                warn!(%session_id, "no server session to clear");
            }
            Err(e) => return Err(e.into()),
        }
    }
    store.clear_conversation(doc_id)?;
    Ok(())
}

/// One-off retrieval query against the document's collection. Nothing is
/// recorded in the conversation.
pub async fn query_document(
    store: &DocumentStore,
    client: &ApiClient,
    doc_id: &str,
    query: &str,
) -> Result<QueryResponse> {
    let doc = store
        .get_document(doc_id)
        .ok_or_else(|| CommandError::NotFound(doc_id.to_string()))?;
    Ok(client.query_documents(&doc.document_id, query).await?)
}

/// Ids of every chat session the server holds.
pub async fn list_sessions(client: &ApiClient) -> Result<Vec<String>> {
    Ok(client.list_sessions().await?)
}

/// The server's copy of a document's chat session.
pub async fn session_history(
    store: &DocumentStore,
    client: &ApiClient,
    doc_id: &str,
) -> Result<Session> {
    let doc = store
        .get_document(doc_id)
        .ok_or_else(|| CommandError::NotFound(doc_id.to_string()))?;
    Ok(client.get_session(&doc.document_id).await?)
}

/// Deletes the server session for a document. The local transcript is kept.
pub async fn delete_session(
    store: &DocumentStore,
    client: &ApiClient,
    doc_id: &str,
) -> Result<StatusMessage> {
    let doc = store
        .get_document(doc_id)
        .ok_or_else(|| CommandError::NotFound(doc_id.to_string()))?;
    let status = client.delete_session(&doc.document_id).await?;
    info!(doc_id, session_id = %doc.document_id, "server session deleted");
    Ok(status)
}
