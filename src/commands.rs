//! CLI command runners.
//!
//! Each runner builds only the providers its command needs and prints
//! human-readable output to stdout.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::advice::{validate_advice_request, LegalAdvisor, Retriever};
use crate::classifier::{LinearClassifier, RiskAnalyzer};
use crate::config::Config;
use crate::db;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::extract::{content_type_for, extract_text, MIME_TEXT};
use crate::lawyers::{LawyerDirectory, LawyerFilters};
use crate::llm::{create_generator, GenerationOptions, TextGenerator};
use crate::news::{normalize_paging, NewsClient};
use crate::preprocess::normalize_whitespace;
use crate::scraper::LawScraper;
use crate::store::SqliteVectorStore;
use crate::summarize::{summarize_document, LlmSummarizer};
use crate::will::WillGenerator;

fn embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::from(create_provider(&config.embedding)?))
}

fn generator(config: &Config) -> Result<Arc<dyn TextGenerator>> {
    Ok(Arc::from(create_generator(&config.llm)?))
}

async fn retriever(config: &Config) -> Result<Retriever> {
    let pool = db::connect_existing(config).await?;
    Ok(Retriever::new(
        embedder(config)?,
        Arc::new(SqliteVectorStore::new(pool)),
        config.retrieval.max_k,
    ))
}

async fn advisor(config: &Config) -> Result<LegalAdvisor> {
    Ok(LegalAdvisor::new(
        retriever(config).await?,
        generator(config)?,
        GenerationOptions::from_config(&config.llm),
        config.llm.compare_temperature,
    ))
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = normalize_whitespace(text);
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut)
}

pub async fn run_predict(config: &Config, clause: &str) -> Result<()> {
    if clause.trim().is_empty() {
        bail!("No clause_text provided");
    }
    let classifier = LinearClassifier::load(&config.classifier.path)?;
    let analyzer = RiskAnalyzer::new(embedder(config)?, Arc::new(classifier));
    println!("{}", analyzer.predict(clause).await?);
    Ok(())
}

/// Read a document for summarizing. PDF and DOCX go through text
/// extraction; anything else is read as UTF-8 text.
pub fn read_document(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = content_type_for(path).unwrap_or(MIME_TEXT);
    extract_text(&bytes, content_type)
        .map_err(|e| anyhow!("{}: {}", path.display(), e))
}

pub async fn run_summarize(config: &Config, path: &Path) -> Result<()> {
    let text = normalize_whitespace(&read_document(path)?);
    if text.is_empty() {
        bail!("No text provided");
    }
    let summarizer = LlmSummarizer::new(
        generator(config)?,
        GenerationOptions::from_config(&config.llm),
    );
    let summary = summarize_document(&summarizer, &text, &config.summarizer)
        .await
        .context("Failed to generate summary")?;
    println!("{}", summary);
    Ok(())
}

pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.default_k);
    let results = retriever(config).await?.search(query, k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            i + 1,
            r.similarity,
            r.metadata.source,
            r.metadata.category
        );
        if let Some(pdf) = &r.metadata.pdf_path {
            println!("    pdf: {}", pdf);
        }
        println!("    {}", preview(&r.content, 200));
        println!();
    }
    Ok(())
}

pub async fn run_advice(config: &Config, situation: &str, cases: usize) -> Result<()> {
    validate_advice_request(situation, cases).map_err(|e| anyhow!(e))?;
    let outcome = advisor(config).await?.advise(situation, cases).await;

    if let Some(error) = &outcome.error {
        println!("Error: {}", error);
    }
    if let Some(analysis) = &outcome.analysis {
        println!("{}", analysis);
        println!();
    }
    if let Some(refs) = &outcome.cases_referenced {
        println!("--- Cases referenced ({}) ---", refs.len());
        for source in refs {
            println!("  {}", source);
        }
        println!();
    }
    println!("{}", outcome.disclaimer);
    Ok(())
}

pub async fn run_compare(config: &Config, query: &str) -> Result<()> {
    println!("{}", advisor(config).await?.compare(query).await?);
    Ok(())
}

pub struct NewsArgs {
    pub page: i64,
    pub page_size: i64,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

pub async fn run_news(config: &Config, args: NewsArgs) -> Result<()> {
    let client = NewsClient::new(&config.news)?;
    let (page, page_size) = normalize_paging(args.page, args.page_size);
    let (location, detected_from) = client.resolve_location(args.city, args.state, args.country);
    let news = client.fetch(location, detected_from, page, page_size).await?;

    let p = &news.meta.pagination;
    println!(
        "page {}/{} ({} legal articles)",
        p.current_page, p.total_pages, p.total_items
    );
    if news.articles.is_empty() {
        println!("No results.");
    }
    for a in &news.articles {
        println!("{}. {}", a.id, a.title.as_deref().unwrap_or("(untitled)"));
        if let Some(name) = &a.source.name {
            println!("    source: {}", name);
        }
        if let Some(date) = &a.published_at {
            println!("    published: {}", date);
        }
        if let Some(url) = &a.url {
            println!("    url: {}", url);
        }
        println!("    terms: {}", a.legal_terms_found.join(", "));
        println!();
    }
    Ok(())
}

pub async fn run_laws(config: &Config, query: &str, max_results: usize) -> Result<()> {
    if max_results == 0 {
        bail!("maxResults must be a positive integer");
    }
    let result = LawScraper::new(&config.scraper)?
        .search(query, max_results)
        .await
        .map_err(|e| anyhow!("{}", e))?;

    println!("{} documents for \"{}\"", result.total_results, result.query);
    for (i, doc) in result.documents.iter().enumerate() {
        println!("{}. {}", i + 1, doc.title);
        println!("    url: {}", doc.url);
        if let Some(date) = &doc.metadata.date_published {
            println!("    published: {}", date);
        }
        if let Some(ministry) = &doc.metadata.ministry {
            println!("    ministry: {}", ministry);
        }
        println!("    {}", preview(&doc.content, 300));
        println!();
    }
    Ok(())
}

pub async fn run_will(config: &Config, input: &str, output: Option<&Path>) -> Result<()> {
    let wills = WillGenerator::new(generator(config)?, GenerationOptions::from_config(&config.llm));
    let generated = wills.generate(input).await?;

    match output {
        Some(path) => {
            std::fs::write(path, &generated.will)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Will written to {}", path.display());
        }
        None => println!("{}", generated.will),
    }
    Ok(())
}

pub async fn run_lawyers(config: &Config, filters: LawyerFilters) -> Result<()> {
    let directory = LawyerDirectory::load(&config.lawyers)?;
    let found = directory.search(&filters, embedder(config)?.as_ref()).await?;

    if found.is_empty() {
        println!("No lawyers match.");
        return Ok(());
    }
    for m in &found {
        let l = &m.lawyer;
        match m.similarity {
            Some(s) => println!("{} [{:.3}]", l.name, s),
            None => println!("{}", l.name),
        }
        println!("    {} | {} | {} years", l.specialization, l.city, l.experience_years);
        println!("    rating: {} ({} reviews)", l.rating, l.reviews);
        println!("    languages: {}", l.languages);
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("a  b\n c", 10), "a b c");
        assert_eq!(preview("धारा धारा", 4), "धारा...");
    }

    #[test]
    fn test_read_document_text_and_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notice.txt");
        std::fs::write(&txt, "Pay rent within 7 days.").unwrap();
        assert_eq!(read_document(&txt).unwrap(), "Pay rent within 7 days.");

        let other = dir.path().join("notice.rtf");
        std::fs::write(&other, "plain").unwrap();
        assert_eq!(read_document(&other).unwrap(), "plain");

        assert!(read_document(&dir.path().join("missing.txt")).is_err());
    }
}
