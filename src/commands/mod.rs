//! User actions: what the upload page, library page and chat page did on a
//! click, without the rendering.

pub mod chat;
pub mod library;
pub mod settings;

use crate::api::ApiError;
use crate::db::DbError;
use crate::doc_processor::ValidationError;
use crate::store::StoreError;

pub const UPLOAD_FAILED: &str = "Failed to upload document. Please try again.";
pub const SEND_FAILED: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Upload rejected by the server or the network; carries the message to show.
    #[error("{0}")]
    Upload(String),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Unknown setting key: {0}")]
    UnknownSetting(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, CommandError>;
