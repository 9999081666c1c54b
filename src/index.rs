//! Index builder: corpus → documents → chunks → embeddings.
//!
//! `lexassist index build` scans the corpus, upserts one `documents` row per
//! file, re-chunks documents whose content changed, and embeds every chunk
//! whose vector is missing or stale. Files that disappeared from the corpus
//! are pruned. Embedding failures are not fatal: the affected chunks stay
//! pending and are picked up by the next build.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::{chunk_paragraphs, hash_text};
use crate::config::Config;
use crate::corpus;
use crate::db;
use crate::embedding::{self, vec_to_blob, EmbeddingProvider};
use crate::migrate;
use crate::models::{Chunk, CorpusItem, PassageMetadata};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub scanned: u64,
    pub upserted: u64,
    pub unchanged: u64,
    pub removed: u64,
    pub chunks_written: u64,
    pub embeddings_written: u64,
    pub embeddings_pending: u64,
}

pub async fn run_index_build(config: &Config, full: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let provider: Option<Box<dyn EmbeddingProvider>> = if config.embedding.is_enabled() {
        match embedding::create_provider(&config.embedding) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "could not create embedding provider; chunks left pending");
                None
            }
        }
    } else {
        None
    };

    let items = corpus::scan_corpus(&config.corpus)?;
    let stats = build_index(
        &pool,
        &items,
        provider.as_deref(),
        config.chunking.max_tokens,
        config.embedding.batch_size,
        full,
    )
    .await?;

    println!("index build{}", if full { " (full)" } else { "" });
    println!("  scanned: {} files", stats.scanned);
    println!("  upserted documents: {}", stats.upserted);
    println!("  unchanged documents: {}", stats.unchanged);
    println!("  removed documents: {}", stats.removed);
    println!("  chunks written: {}", stats.chunks_written);
    if config.embedding.is_enabled() {
        println!("  embeddings written: {}", stats.embeddings_written);
    }
    println!("  embeddings pending: {}", stats.embeddings_pending);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Print every indexed source with its category and chunk count.
pub async fn run_index_sources(config: &Config) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let rows = sqlx::query(
        r#"
        SELECT d.source, d.category, COUNT(c.id) AS chunks, COUNT(cv.chunk_id) AS vectors
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        LEFT JOIN chunk_vectors cv ON cv.chunk_id = c.id
        GROUP BY d.id
        ORDER BY d.category, d.source
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if rows.is_empty() {
        println!("No indexed sources.");
    }
    for row in &rows {
        let source: String = row.get("source");
        let category: String = row.get("category");
        let chunks: i64 = row.get("chunks");
        let vectors: i64 = row.get("vectors");
        println!(
            "{:<40} {:<16} chunks: {:<5} embedded: {}",
            source, category, chunks, vectors
        );
    }

    pool.close().await;
    Ok(())
}

/// Bring the index in line with `items`.
///
/// With `full`, every document is re-chunked even when unchanged.
pub async fn build_index(
    pool: &SqlitePool,
    items: &[CorpusItem],
    provider: Option<&dyn EmbeddingProvider>,
    max_tokens: usize,
    batch_size: usize,
    full: bool,
) -> Result<IndexStats> {
    let mut stats = IndexStats {
        scanned: items.len() as u64,
        ..IndexStats::default()
    };

    for item in items {
        let (doc_id, changed) = upsert_document(pool, item).await?;
        if !changed && !full {
            stats.unchanged += 1;
            continue;
        }
        let chunks = chunk_paragraphs(&doc_id, &item.body, max_tokens);
        replace_chunks(pool, &doc_id, &chunks).await?;
        stats.upserted += 1;
        stats.chunks_written += chunks.len() as u64;
    }

    let keep: HashSet<&str> = items.iter().map(|i| i.source_id.as_str()).collect();
    stats.removed = prune_missing(pool, &keep).await?;

    let (written, pending) = embed_pending(pool, provider, batch_size).await?;
    stats.embeddings_written = written;
    stats.embeddings_pending = pending;

    info!(
        scanned = stats.scanned,
        upserted = stats.upserted,
        chunks = stats.chunks_written,
        embedded = stats.embeddings_written,
        pending = stats.embeddings_pending,
        "index build complete"
    );
    Ok(stats)
}

fn dedup_hash(item: &CorpusItem) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item.source_id.as_bytes());
    hasher.update(item.category.as_bytes());
    hasher.update(item.body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Insert or update a document. Returns its id and whether its content
/// differs from what was stored.
async fn upsert_document(pool: &SqlitePool, item: &CorpusItem) -> Result<(String, bool)> {
    let hash = dedup_hash(item);

    let existing = sqlx::query("SELECT id, dedup_hash FROM documents WHERE source_id = ?")
        .bind(&item.source_id)
        .fetch_optional(pool)
        .await?;
    let (doc_id, changed) = match existing {
        Some(row) => {
            let old_hash: String = row.get("dedup_hash");
            (row.get::<String, _>("id"), old_hash != hash)
        }
        None => (Uuid::new_v4().to_string(), true),
    };

    let metadata_json = serde_json::to_string(&PassageMetadata {
        source: item.source.clone(),
        category: item.category.clone(),
        pdf_path: item.pdf_path.clone(),
    })?;

    sqlx::query(
        r#"
        INSERT INTO documents (id, source_id, source, category, title, content_type, body, metadata_json, dedup_hash, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id) DO UPDATE SET
            source = excluded.source,
            category = excluded.category,
            title = excluded.title,
            content_type = excluded.content_type,
            body = excluded.body,
            metadata_json = excluded.metadata_json,
            dedup_hash = excluded.dedup_hash,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&doc_id)
    .bind(&item.source_id)
    .bind(&item.source)
    .bind(&item.category)
    .bind(&item.title)
    .bind(&item.content_type)
    .bind(&item.body)
    .bind(&metadata_json)
    .bind(&hash)
    .bind(item.updated_at.timestamp())
    .execute(pool)
    .await?;

    Ok((doc_id, changed))
}

async fn replace_chunks(pool: &SqlitePool, document_id: &str, chunks: &[Chunk]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "DELETE FROM embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE document_id = ?)",
    )
    .bind(document_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Delete documents whose source file is no longer in the corpus.
async fn prune_missing(pool: &SqlitePool, keep: &HashSet<&str>) -> Result<u64> {
    let rows = sqlx::query("SELECT id, source_id FROM documents")
        .fetch_all(pool)
        .await?;

    let mut removed = 0u64;
    for row in rows {
        let source_id: String = row.get("source_id");
        if keep.contains(source_id.as_str()) {
            continue;
        }
        let doc_id: String = row.get("id");
        replace_chunks(pool, &doc_id, &[]).await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(&doc_id)
            .execute(pool)
            .await?;
        removed += 1;
    }
    Ok(removed)
}

struct PendingChunk {
    chunk_id: String,
    document_id: String,
    text: String,
}

async fn find_pending_chunks(pool: &SqlitePool, model: &str) -> Result<Vec<PendingChunk>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id AS chunk_id, c.document_id, c.text
        FROM chunks c
        LEFT JOIN embeddings e ON e.chunk_id = c.id AND e.model = ?
        WHERE e.chunk_id IS NULL OR e.hash != c.hash
        ORDER BY c.document_id, c.chunk_index
        "#,
    )
    .bind(model)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PendingChunk {
            chunk_id: row.get("chunk_id"),
            document_id: row.get("document_id"),
            text: row.get("text"),
        })
        .collect())
}

/// Embed chunks lacking an up-to-date vector. Returns `(written, pending)`.
async fn embed_pending(
    pool: &SqlitePool,
    provider: Option<&dyn EmbeddingProvider>,
    batch_size: usize,
) -> Result<(u64, u64)> {
    let Some(provider) = provider else {
        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks c LEFT JOIN chunk_vectors cv ON cv.chunk_id = c.id WHERE cv.chunk_id IS NULL",
        )
        .fetch_one(pool)
        .await?;
        return Ok((0, pending as u64));
    };

    let model = provider.model_name().to_string();
    let pending = find_pending_chunks(pool, &model).await?;
    let mut written = 0u64;
    let mut failed = 0u64;

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        match embedding::embed_batched(provider, &texts, batch_size).await {
            Ok(vectors) => {
                for (item, vec) in batch.iter().zip(vectors.iter()) {
                    upsert_embedding(pool, item, &model, vec).await?;
                    written += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, chunks = batch.len(), "embedding batch failed");
                failed += batch.len() as u64;
            }
        }
    }

    Ok((written, failed))
}

async fn upsert_embedding(
    pool: &SqlitePool,
    chunk: &PendingChunk,
    model: &str,
    vector: &[f32],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO embeddings (chunk_id, model, dims, created_at, hash)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            model = excluded.model,
            dims = excluded.dims,
            created_at = excluded.created_at,
            hash = excluded.hash
        "#,
    )
    .bind(&chunk.chunk_id)
    .bind(model)
    .bind(vector.len() as i64)
    .bind(now)
    .bind(hash_text(&chunk.text))
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, document_id, embedding)
        VALUES (?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            document_id = excluded.document_id,
            embedding = excluded.embedding
        "#,
    )
    .bind(&chunk.chunk_id)
    .bind(&chunk.document_id)
    .bind(vec_to_blob(vector))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
