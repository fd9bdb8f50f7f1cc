//! In-memory document and conversation state, written through to [`Database`].
//!
//! One [`DocumentStore`] is built per application instance and handed to the
//! commands by reference.
//!
//! Mutators stage the new state on a copy and adopt it only after the write
//! succeeds, so a failed write leaves memory matching disk.

use crate::db::models::{Conversations, Document, Message, NewDocument, NewMessage};
use crate::db::{Database, DbError, ErasedRecord, CONVERSATIONS_KEY, DOCUMENTS_KEY};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Stored record '{key}' could not be read: {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Persistence error: {0}")]
    Persistence(DbError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Corrupt { key, source } => StoreError::CorruptRecord { key, source },
            other => StoreError::Persistence(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub struct DocumentStore {
    db: Database,
    documents: Vec<Document>,
    conversations: Conversations,
}

impl DocumentStore {
    /// Loads both records. A missing record starts empty; a corrupt one is an
    /// error so the caller can decide whether to discard it.
    pub fn open(db: Database) -> Result<Self> {
        let documents = db.load(DOCUMENTS_KEY)?.unwrap_or_default();
        let conversations = db.load(CONVERSATIONS_KEY)?.unwrap_or_default();
        Ok(Self::loaded(db, documents, conversations))
    }

    /// Like [`DocumentStore::open`], but a corrupt record is logged and
    /// replaced with an empty one. The replacement is not written back until
    /// the next mutation.
    pub fn open_discarding_corrupt(db: Database) -> Result<Self> {
        let documents = load_or_discard(&db, DOCUMENTS_KEY)?;
        let conversations = load_or_discard(&db, CONVERSATIONS_KEY)?;
        Ok(Self::loaded(db, documents, conversations))
    }

    fn loaded(db: Database, documents: Vec<Document>, conversations: Conversations) -> Self {
        debug!(
            documents = documents.len(),
            conversations = conversations.len(),
            "store loaded"
        );
        Self {
            db,
            documents,
            conversations,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ── Documents ──

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn add_document(&mut self, meta: NewDocument) -> Result<Document> {
        let doc = Document {
            id: new_id(),
            name: meta.name,
            size: meta.size,
            document_id: meta.document_id,
            page_count: meta.page_count,
            uploaded_at: now(),
        };
        let mut documents = self.documents.clone();
        documents.push(doc.clone());
        self.db.save(DOCUMENTS_KEY, &documents)?;
        self.documents = documents;
        info!(id = %doc.id, name = %doc.name, "document added");
        Ok(doc)
    }

    /// Removes the document and its conversation. Both records are written in
    /// one transaction. Unknown ids are a no-op apart from the write.
    pub fn remove_document(&mut self, id: &str) -> Result<()> {
        let mut documents = self.documents.clone();
        documents.retain(|doc| doc.id != id);
        let mut conversations = self.conversations.clone();
        conversations.remove(id);

        {
            let documents: &dyn ErasedRecord = &documents;
            let conversations: &dyn ErasedRecord = &conversations;
            self.db.save_many(&[
                (DOCUMENTS_KEY, documents),
                (CONVERSATIONS_KEY, conversations),
            ])?;
        }
        self.documents = documents;
        self.conversations = conversations;
        info!(id, "document removed");
        Ok(())
    }

    pub fn get_document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    // ── Conversations ──

    pub fn add_message(&mut self, doc_id: &str, msg: NewMessage) -> Result<Message> {
        let message = Message {
            id: new_id(),
            role: msg.role,
            content: msg.content,
            sources: msg.sources,
            is_error: msg.is_error,
            timestamp: now(),
        };
        let mut conversations = self.conversations.clone();
        conversations
            .entry(doc_id.to_string())
            .or_default()
            .push(message.clone());
        self.db.save(CONVERSATIONS_KEY, &conversations)?;
        self.conversations = conversations;
        debug!(doc_id, role = message.role.as_str(), "message added");
        Ok(message)
    }

    pub fn get_conversation(&self, doc_id: &str) -> &[Message] {
        self.conversations
            .get(doc_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn message_count(&self, doc_id: &str) -> usize {
        self.get_conversation(doc_id).len()
    }

    pub fn clear_conversation(&mut self, doc_id: &str) -> Result<()> {
        let mut conversations = self.conversations.clone();
        conversations.insert(doc_id.to_string(), Vec::new());
        self.db.save(CONVERSATIONS_KEY, &conversations)?;
        self.conversations = conversations;
        info!(doc_id, "conversation cleared");
        Ok(())
    }
}

fn load_or_discard<T: serde::de::DeserializeOwned + Default>(
    db: &Database,
    key: &str,
) -> Result<T> {
    match db.load(key) {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(DbError::Corrupt { key, source }) => {
            warn!(%key, error = %source, "discarding corrupt record");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
