//! Document summarization.
//!
//! Long documents are cut into word-bounded chunks
//! ([`crate::chunk::chunk_words`]); every chunk with enough words is
//! summarized on its own and the partial summaries are joined with a space.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

use crate::chunk::chunk_words;
use crate::config::SummarizerConfig;
use crate::llm::{GenerationOptions, TextGenerator};

/// Text → summary bounded to roughly `min_words..=max_words` words.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, max_words: usize, min_words: usize) -> Result<String>;
}

/// [`Summarizer`] that prompts a [`TextGenerator`].
pub struct LlmSummarizer {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
}

impl LlmSummarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, options: GenerationOptions) -> Self {
        Self { generator, options }
    }
}

fn summary_prompt(text: &str, max_words: usize, min_words: usize) -> String {
    format!(
        "Summarize the following legal text in plain language. Use between {} and {} words. \
         Reply with the summary only.\n\nTEXT:\n{}",
        min_words, max_words, text
    )
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str, max_words: usize, min_words: usize) -> Result<String> {
        let reply = self
            .generator
            .generate(&summary_prompt(text, max_words, min_words), &self.options)
            .await?;
        Ok(reply.trim().to_string())
    }
}

/// Summarize a whole document chunk by chunk.
///
/// Chunks shorter than `config.min_chunk_words` are skipped. If that leaves
/// nothing, the full text is summarized in one call. Empty input yields an
/// empty summary without calling the model.
pub async fn summarize_document(
    summarizer: &dyn Summarizer,
    text: &str,
    config: &SummarizerConfig,
) -> Result<String> {
    let mut parts = Vec::new();

    for (i, chunk) in chunk_words(text, config.max_chunk_chars).iter().enumerate() {
        let words = chunk.split_whitespace().count();
        if words < config.min_chunk_words {
            debug!(chunk = i, words, "skipping short chunk");
            continue;
        }
        let summary = summarizer
            .summarize(chunk, config.max_length, config.min_length)
            .await
            .map_err(|e| {
                error!(chunk = i, error = %e, "summarization failed");
                e
            })
            .with_context(|| format!("summarizing chunk {}", i))?;
        parts.push(summary);
    }

    let combined = parts.join(" ");
    if combined.trim().is_empty() && !text.trim().is_empty() {
        return summarizer
            .summarize(text, config.max_length, config.min_length)
            .await
            .map_err(|e| {
                error!(error = %e, "summarization failed");
                e
            });
    }

    Ok(combined)
}
