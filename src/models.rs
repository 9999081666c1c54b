//! Core data types shared by the index, the retrieval pipeline and the
//! HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A corpus file read from disk, before chunking.
#[derive(Debug, Clone)]
pub struct CorpusItem {
    /// Path relative to the corpus root; stable across rebuilds.
    pub source_id: String,
    /// File name shown as the case reference.
    pub source: String,
    pub category: String,
    pub title: String,
    pub content_type: String,
    pub body: String,
    /// Set for PDF files so clients can fetch the original document.
    pub pdf_path: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A chunk of a document's body text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Metadata attached to every indexed passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    pub source: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
}

/// A unit of retrievable text: one chunk plus its document metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    pub content: String,
    pub metadata: PassageMetadata,
}

/// A passage returned from similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPassage {
    pub content: String,
    pub metadata: PassageMetadata,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub similarity: f32,
}

/// Risk verdict for one clause of a document.
#[derive(Debug, Clone, Serialize)]
pub struct ClauseRisk {
    pub clause_number: usize,
    pub text: String,
    pub risk_level: String,
}
