//! Source documents produced by upstream extraction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{document_repo, Database, DatabaseError};
use crate::value::FieldMap;

/// An extracted, field-normalized document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub id: String,
    /// Informational. Matching resolves rules with the run options or the
    /// instance's refs, never with a document's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    /// Informational, like `company_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    #[serde(default)]
    pub fields: FieldMap,
}

/// Per-document load failures. Recorded on the document outcome; never
/// abort a run.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Failed to load document '{id}': {source}")]
    Load {
        id: String,
        #[source]
        source: DatabaseError,
    },
}

/// Where the matching engine reads documents from.
pub trait DocumentSource: Send + Sync {
    fn load_document(&self, id: &str) -> Result<SourceDocument, DocumentError>;
}

/// SQLite-backed document store.
#[derive(Clone)]
pub struct DocumentStore {
    db: Database,
}

impl DocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts or replaces documents, returning how many were written.
    pub fn import(&self, documents: &[SourceDocument]) -> Result<usize, DatabaseError> {
        self.db.with_transaction(|tx| {
            for document in documents {
                document_repo::upsert(tx, document)?;
            }
            Ok(documents.len())
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<SourceDocument>, DatabaseError> {
        self.db.with_conn(|conn| document_repo::find_by_id(conn, id))
    }
}

impl DocumentSource for DocumentStore {
    fn load_document(&self, id: &str) -> Result<SourceDocument, DocumentError> {
        self.get(id)
            .map_err(|source| DocumentError::Load {
                id: id.to_string(),
                source,
            })?
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))
    }
}
