//! Retrieval-augmented legal advice and law-version comparison.
//!
//! ```text
//! situation ─▶ embed ─▶ VectorStore top-k ─▶ format cases ─▶ prompt ─▶ TextGenerator
//! ```
//!
//! [`Retriever`] wraps an embedder and a vector store. [`LegalAdvisor`] adds a
//! generator and owns the prompt templates for `/advice`, the notice-reply
//! section of `/api/analyze`, and `/compare`.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::llm::{GenerationOptions, TextGenerator};
use crate::models::{PassageMetadata, ScoredPassage};
use crate::store::VectorStore;

pub const DISCLAIMER: &str = "IMPORTANT DISCLAIMER:\n\
This analysis is provided for informational purposes only and should not be considered as legal advice. \
The recommendations are based on similar historical cases but may not fully apply to your specific situation. \
Please consult with qualified legal professionals before taking any action. \
The accuracy of case references and citations should be independently verified.";

pub const ERROR_DISCLAIMER: &str = "An error occurred while generating advice. Please try again.";

pub const MIN_SITUATION_CHARS: usize = 10;
pub const MAX_SITUATION_CHARS: usize = 2000;
pub const MAX_CASES: usize = 10;

const ADVICE_INSTRUCTIONS: &str = "Please provide:\n\
1. A brief analysis of the situation\n\
2. Specific steps recommended based on similar cases (with case references)\n\
3. Key considerations and potential challenges";

const NOTICE_REPLY_INSTRUCTIONS: &str = "Act like an contract/application notice drafter that replies to the given Notice \
based on Indian Laws in reply to this based on whichever domain applicable - Labor Laws\n\
-Copyright\n\
-Real Estate Regulation & Development Act\n\
-GDPR\n\
-Foreign Trade & Customs Act\n\
and give links to indiankanoon website at the end";

/// Which advice template to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceStyle {
    /// Actionable steps with inline case citations (`/advice`).
    Steps,
    /// Steps plus a drafted reply to a legal notice (`/api/analyze`).
    NoticeReply,
}

/// Result of an advice request. Failures are reported in-band.
#[derive(Debug, Clone, Serialize)]
pub struct AdviceOutcome<R> {
    pub success: bool,
    pub analysis: Option<String>,
    pub cases_referenced: Option<Vec<R>>,
    pub disclaimer: String,
    pub error: Option<String>,
}

impl<R> AdviceOutcome<R> {
    fn ok(analysis: String, cases: Vec<R>) -> Self {
        Self {
            success: true,
            analysis: Some(analysis),
            cases_referenced: Some(cases),
            disclaimer: DISCLAIMER.to_string(),
            error: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            analysis: None,
            cases_referenced: None,
            disclaimer: ERROR_DISCLAIMER.to_string(),
            error: Some(message),
        }
    }
}

/// Check an `/advice` request. Returns the 400 message on violation.
pub fn validate_advice_request(situation: &str, num_cases: usize) -> Result<(), String> {
    let len = situation.chars().count();
    if len < MIN_SITUATION_CHARS {
        return Err(format!(
            "situation_summary must be at least {} characters",
            MIN_SITUATION_CHARS
        ));
    }
    if len > MAX_SITUATION_CHARS {
        return Err(format!(
            "situation_summary must be at most {} characters",
            MAX_SITUATION_CHARS
        ));
    }
    if !(1..=MAX_CASES).contains(&num_cases) {
        return Err(format!("num_cases must be between 1 and {}", MAX_CASES));
    }
    Ok(())
}

/// Render retrieved cases for the advice prompt.
pub fn format_cases(cases: &[ScoredPassage]) -> String {
    cases
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "Case {} [Ref: {}] ({}):\n{}",
                i + 1,
                c.metadata.source,
                c.metadata.category,
                c.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn advice_prompt(situation: &str, relevant_cases: &str, style: AdviceStyle) -> String {
    let closing = match style {
        AdviceStyle::Steps => "Format the response in a clear, structured way with case citations inline.".to_string(),
        AdviceStyle::NoticeReply => format!(
            "{}\nFormat the response in a clear, structured way with case citations inline",
            NOTICE_REPLY_INSTRUCTIONS
        ),
    };
    format!(
        "Analyze the following situation and provide actionable steps based on similar cases:\n\n\
         SITUATION:\n{}\n\n\
         RELEVANT CASES AND PRECEDENTS:\n{}\n\n\
         {}\n\n\
         {}",
        situation, relevant_cases, ADVICE_INSTRUCTIONS, closing
    )
}

pub fn compare_prompt(first: &ScoredPassage, second: &ScoredPassage) -> String {
    format!(
        "Compare these two versions of legal text and explain specifically how the law has evolved:\n\n\
         Text 1 (from {}):\n{}\n\n\
         Text 2 (from {}):\n{}\n\n\
         Please provide a clear, focused explanation of:\n\
         1. What specific changes were made to the law\n\
         2. How the requirements or obligations have evolved\n\
         3. What this evolution means in practical terms\n\n\
         Focus solely on explaining how the law has changed from one version to the next. \
         Provide concrete examples from the texts to support your explanation.",
        first.metadata.source, first.content, second.metadata.source, second.content
    )
}

/// Embed-then-search over a [`VectorStore`].
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    max_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>, max_k: usize) -> Self {
        Self {
            embedder,
            store,
            max_k,
        }
    }

    /// Up to `k` passages, most similar first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        self.store
            .similarity_search(&vector, k.min(self.max_k))
            .await
    }

    pub async fn sources(&self) -> Result<Vec<String>> {
        self.store.list_sources().await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }
}

#[derive(Clone)]
pub struct LegalAdvisor {
    retriever: Retriever,
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    compare_temperature: f32,
}

impl LegalAdvisor {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn TextGenerator>,
        options: GenerationOptions,
        compare_temperature: f32,
    ) -> Self {
        Self {
            retriever,
            generator,
            options,
            compare_temperature,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    async fn generate_advice(
        &self,
        situation: &str,
        num_cases: usize,
        style: AdviceStyle,
    ) -> Result<(String, Vec<ScoredPassage>)> {
        let cases = self.retriever.search(situation, num_cases).await?;
        let prompt = advice_prompt(situation, &format_cases(&cases), style);
        let analysis = self.generator.generate(&prompt, &self.options).await?;
        info!(cases = cases.len(), ?style, "advice generated");
        Ok((analysis, cases))
    }

    /// Advice for `/advice`: cases are referenced by source name.
    pub async fn advise(&self, situation: &str, num_cases: usize) -> AdviceOutcome<String> {
        match self
            .generate_advice(situation, num_cases, AdviceStyle::Steps)
            .await
        {
            Ok((analysis, cases)) => AdviceOutcome::ok(
                analysis,
                cases.into_iter().map(|c| c.metadata.source).collect(),
            ),
            Err(e) => {
                error!(error = %e, "advice failed");
                AdviceOutcome::failed(format!("{:#}", e))
            }
        }
    }

    /// Notice-reply advice for `/api/analyze`: cases carry full metadata.
    pub async fn advise_notice(
        &self,
        situation: &str,
        num_cases: usize,
    ) -> AdviceOutcome<PassageMetadata> {
        match self
            .generate_advice(situation, num_cases, AdviceStyle::NoticeReply)
            .await
        {
            Ok((analysis, cases)) => {
                AdviceOutcome::ok(analysis, cases.into_iter().map(|c| c.metadata).collect())
            }
            Err(e) => {
                error!(error = %e, "notice advice failed");
                AdviceOutcome::failed(format!("{:#}", e))
            }
        }
    }

    /// Explain how the law changed between the two passages closest to
    /// `query`. Retrieval errors propagate; shortfalls and generator errors
    /// come back as the result text.
    pub async fn compare(&self, query: &str) -> Result<String> {
        let results = self.retriever.search(query, 2).await?;
        let (first, second) = match results.as_slice() {
            [] => return Ok("Error: Could not find relevant law sections.".to_string()),
            [_] => {
                return Ok(
                    "Error: Could not find multiple versions or sections for comparison."
                        .to_string(),
                )
            }
            [first, second, ..] => (first, second),
        };

        let options = self
            .options
            .clone()
            .with_temperature(self.compare_temperature);
        match self
            .generator
            .generate(&compare_prompt(first, second), &options)
            .await
        {
            Ok(text) => Ok(text),
            Err(e) => {
                error!(error = %e, "comparison failed");
                Ok(format!("Error during comparison: {:#}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Passage;
    use crate::store::InMemoryVectorStore;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("wage") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    /// Echoes prompts back and records the options it was called with.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, f32)>>,
    }

    #[async_trait]
    impl TextGenerator for Recorder {
        fn model_name(&self) -> &str {
            "recorder"
        }
        async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), options.temperature));
            Ok("generated".to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl TextGenerator for Broken {
        fn model_name(&self) -> &str {
            "broken"
        }
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
            bail!("quota exceeded")
        }
    }

    fn passage(text: &str, source: &str, category: &str) -> Passage {
        Passage {
            content: text.to_string(),
            metadata: PassageMetadata {
                source: source.to_string(),
                category: category.to_string(),
                pdf_path: Some(format!("{}/{}", category, source)),
            },
        }
    }

    fn store_with(n: usize) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        let data = [
            (vec![1.0, 0.0], passage("Minimum wage act 1948.", "wages_1948.pdf", "labour")),
            (vec![0.9, 0.1], passage("Code on wages 2019.", "wages_2019.pdf", "labour")),
            (vec![0.0, 1.0], passage("Copyright act.", "copyright.pdf", "ip")),
        ];
        for (vec, p) in data.into_iter().take(n) {
            store.insert(vec, p);
        }
        store
    }

    fn advisor(store: Arc<InMemoryVectorStore>, generator: Arc<dyn TextGenerator>) -> LegalAdvisor {
        let retriever = Retriever::new(Arc::new(AxisEmbedder), store, 1000);
        LegalAdvisor::new(retriever, generator, GenerationOptions::default(), 0.1)
    }

    #[test]
    fn test_format_cases() {
        let cases = vec![ScoredPassage {
            content: "Text body".into(),
            metadata: PassageMetadata {
                source: "a.pdf".into(),
                category: "civil".into(),
                pdf_path: None,
            },
            similarity: 0.9,
        }];
        assert_eq!(format_cases(&cases), "Case 1 [Ref: a.pdf] (civil):\nText body");
        assert_eq!(format_cases(&[]), "");
    }

    #[test]
    fn test_validation_bounds() {
        assert!(validate_advice_request("too short", 5).is_err());
        assert!(validate_advice_request(&"x".repeat(2001), 5).is_err());
        assert!(validate_advice_request("My employer withheld wages.", 0).is_err());
        assert!(validate_advice_request("My employer withheld wages.", 11).is_err());
        assert!(validate_advice_request("My employer withheld wages.", 10).is_ok());
        assert!(validate_advice_request(&"x".repeat(10), 1).is_ok());
    }

    #[test]
    fn test_notice_prompt_mentions_indiankanoon() {
        let p = advice_prompt("s", "c", AdviceStyle::NoticeReply);
        assert!(p.contains("indiankanoon"));
        assert!(p.contains("SITUATION:\ns"));
        assert!(!advice_prompt("s", "c", AdviceStyle::Steps).contains("indiankanoon"));
    }

    #[tokio::test]
    async fn test_advise_success() {
        let gen = Arc::new(Recorder::default());
        let outcome = advisor(store_with(3), gen.clone())
            .advise("Employer withheld my wage for months", 2)
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.analysis.as_deref(), Some("generated"));
        assert_eq!(
            outcome.cases_referenced.unwrap(),
            vec!["wages_1948.pdf".to_string(), "wages_2019.pdf".to_string()]
        );
        assert_eq!(outcome.disclaimer, DISCLAIMER);
        let seen = gen.seen.lock().unwrap();
        assert!(seen[0].0.contains("Case 2 [Ref: wages_2019.pdf] (labour):"));
    }

    #[tokio::test]
    async fn test_advise_failure_in_band() {
        let outcome = advisor(store_with(3), Arc::new(Broken))
            .advise("Employer withheld my wage for months", 2)
            .await;
        assert!(!outcome.success);
        assert!(outcome.analysis.is_none());
        assert!(outcome.cases_referenced.is_none());
        assert_eq!(outcome.disclaimer, ERROR_DISCLAIMER);
        assert!(outcome.error.unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_advise_notice_reports_metadata() {
        let outcome = advisor(store_with(3), Arc::new(Recorder::default()))
            .advise_notice("Notice about unpaid wage", 1)
            .await;
        let cases = outcome.cases_referenced.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].pdf_path.as_deref(), Some("labour/wages_1948.pdf"));
    }

    #[tokio::test]
    async fn test_compare_shortfalls() {
        let gen = Arc::new(Recorder::default());
        let empty = advisor(store_with(0), gen.clone()).compare("wage law").await.unwrap();
        assert_eq!(empty, "Error: Could not find relevant law sections.");
        let one = advisor(store_with(1), gen.clone()).compare("wage law").await.unwrap();
        assert_eq!(
            one,
            "Error: Could not find multiple versions or sections for comparison."
        );
        assert!(gen.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compare_uses_low_temperature() {
        let gen = Arc::new(Recorder::default());
        let result = advisor(store_with(3), gen.clone()).compare("wage law").await.unwrap();
        assert_eq!(result, "generated");
        let seen = gen.seen.lock().unwrap();
        assert!((seen[0].1 - 0.1).abs() < 1e-6);
        assert!(seen[0].0.contains("Text 1 (from wages_1948.pdf):\nMinimum wage act 1948."));
        assert!(seen[0].0.contains("Text 2 (from wages_2019.pdf):"));
    }

    #[tokio::test]
    async fn test_compare_generator_error_in_result() {
        let result = advisor(store_with(3), Arc::new(Broken))
            .compare("wage law")
            .await
            .unwrap();
        assert!(result.starts_with("Error during comparison: "));
        assert!(result.contains("quota exceeded"));
    }
}
