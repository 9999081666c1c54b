//! Vector store: nearest-neighbour search over embedded passages.
//!
//! Two implementations share the [`VectorStore`] trait:
//!
//! - [`SqliteVectorStore`] reads the index written by `lexassist index build`.
//!   Vectors are loaded per query and scored in Rust (brute-force cosine),
//!   which is fine at case-law-corpus scale.
//! - [`InMemoryVectorStore`] keeps passages in a `Vec`; handy for tests and
//!   for embedding small directories on the fly.
//!
//! Both return results sorted by similarity, highest first, truncated to `k`.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::embedding::{blob_to_vec, cosine_similarity};
use crate::models::{Passage, PassageMetadata, ScoredPassage};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` passages most similar to `query`.
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>>;
    /// Distinct source names, sorted.
    async fn list_sources(&self) -> Result<Vec<String>>;
    /// Number of stored passages.
    async fn count(&self) -> Result<usize>;
}

fn rank(mut scored: Vec<ScoredPassage>, k: usize) -> Vec<ScoredPassage> {
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

// ============ SQLite ============

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Decode `documents.metadata_json`, falling back to the row's columns.
fn row_metadata(source: String, category: String, metadata_json: &str) -> PassageMetadata {
    let pdf_path = serde_json::from_str::<PassageMetadata>(metadata_json)
        .ok()
        .and_then(|m| m.pdf_path);
    PassageMetadata {
        source,
        category,
        pdf_path,
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT cv.embedding, c.text, d.source, d.category, d.metadata_json
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            JOIN documents d ON d.id = cv.document_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let scored = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                ScoredPassage {
                    content: row.get("text"),
                    metadata: row_metadata(row.get("source"), row.get("category"), &metadata_json),
                    similarity: cosine_similarity(query, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(scored, k))
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let sources: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT d.source
            FROM documents d
            JOIN chunk_vectors cv ON cv.document_id = d.id
            ORDER BY d.source
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

// ============ In-memory ============

#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<(Vec<f32>, Passage)>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, embedding: Vec<f32>, passage: Passage) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push((embedding, passage));
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("vector store lock poisoned"))?;
        let scored = entries
            .iter()
            .map(|(vec, passage)| ScoredPassage {
                content: passage.content.clone(),
                metadata: passage.metadata.clone(),
                similarity: cosine_similarity(query, vec),
            })
            .collect();
        Ok(rank(scored, k))
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("vector store lock poisoned"))?;
        let unique: BTreeSet<String> = entries
            .iter()
            .map(|(_, p)| p.metadata.source.clone())
            .collect();
        Ok(unique.into_iter().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().map(|e| e.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str, source: &str) -> Passage {
        Passage {
            content: text.to_string(),
            metadata: PassageMetadata {
                source: source.to_string(),
                category: "civil".to_string(),
                pdf_path: None,
            },
        }
    }

    #[tokio::test]
    async fn test_k_larger_than_index() {
        let store = InMemoryVectorStore::new();
        store.insert(vec![1.0, 0.0], passage("only", "a.pdf"));
        let results = store.similarity_search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "only");
    }

    #[tokio::test]
    async fn test_sorted_by_similarity() {
        let store = InMemoryVectorStore::new();
        store.insert(vec![0.0, 1.0], passage("orthogonal", "a.pdf"));
        store.insert(vec![1.0, 0.1], passage("close", "b.pdf"));
        store.insert(vec![-1.0, 0.0], passage("opposite", "c.pdf"));
        let results = store.similarity_search(&[1.0, 0.0], 3).await.unwrap();
        let order: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["close", "orthogonal", "opposite"]);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_sources_unique_sorted() {
        let store = InMemoryVectorStore::new();
        store.insert(vec![1.0], passage("x", "zeta.pdf"));
        store.insert(vec![1.0], passage("y", "alpha.pdf"));
        store.insert(vec![1.0], passage("z", "zeta.pdf"));
        assert_eq!(
            store.list_sources().await.unwrap(),
            vec!["alpha.pdf".to_string(), "zeta.pdf".to_string()]
        );
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[test]
    fn test_row_metadata_reads_pdf_path() {
        let meta = row_metadata(
            "a.pdf".into(),
            "labour".into(),
            r#"{"source":"a.pdf","category":"labour","pdf_path":"labour/a.pdf"}"#,
        );
        assert_eq!(meta.pdf_path.as_deref(), Some("labour/a.pdf"));
        let meta = row_metadata("b.txt".into(), "general".into(), "{}");
        assert!(meta.pdf_path.is_none());
    }
}
