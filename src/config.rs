//! TOML configuration.
//!
//! Every section except `[db]` and `[server]` has defaults, so a minimal
//! config only names the index database and the bind address:
//!
//! ```toml
//! [db]
//! path = "./data/lexassist.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:5000"
//! ```
//!
//! Secrets never live in the file. API keys are read from the environment
//! (`GOOGLE_API_KEY`, `GNEWS_API_KEY`, `OPENAI_API_KEY`), optionally seeded
//! from a `.env` file by the binary.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub lawyers: LawyersConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Paragraph chunking applied to corpus documents at index-build time.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    700
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// `k` used by `/search` and `/compare` when the request does not set one.
    #[serde(default = "default_k")]
    pub default_k: usize,
    /// Number of cases the analyze flow retrieves for its advice section.
    #[serde(default = "default_advice_k")]
    pub advice_k: usize,
    /// Upper bound on any requested `k`.
    #[serde(default = "default_max_k")]
    pub max_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            advice_k: default_advice_k(),
            max_k: default_max_k(),
        }
    }
}

fn default_k() -> usize {
    2
}
fn default_advice_k() -> usize {
    5
}
fn default_max_k() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Location of the trained clause-risk classifier artifact.
#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_path")]
    pub path: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            path: default_classifier_path(),
        }
    }
}

fn default_classifier_path() -> PathBuf {
    PathBuf::from("./models/risk_classifier.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default = "default_min_chunk_words")]
    pub min_chunk_words: usize,
    #[serde(default = "default_summary_max_words")]
    pub max_length: usize,
    #[serde(default = "default_summary_min_words")]
    pub min_length: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            min_chunk_words: default_min_chunk_words(),
            max_length: default_summary_max_words(),
            min_length: default_summary_min_words(),
        }
    }
}

fn default_max_chunk_chars() -> usize {
    1024
}
fn default_min_chunk_words() -> usize {
    10
}
fn default_summary_max_words() -> usize {
    150
}
fn default_summary_min_words() -> usize {
    30
}

/// Generative model settings shared by advice, comparison, summaries,
/// will extraction and the IVR assistant.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Base URL. Defaults per provider when unset.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the Gemini API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_compare_temperature")]
    pub compare_temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            compare_temperature: default_compare_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_compare_temperature() -> f32 {
    0.1
}
fn default_top_p() -> f32 {
    0.8
}
fn default_top_k() -> u32 {
    40
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_llm_max_retries() -> u32 {
    3
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Case-law corpus scanned by `index build`.
///
/// Files directly under a sub-directory of `root` take that directory's
/// name as their category (`root/labour/x.pdf` → `labour`).
#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Files larger than this are skipped.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from("./corpus")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.docx".to_string(),
    ]
}
fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsConfig {
    #[serde(default = "default_news_url")]
    pub base_url: String,
    /// Overrides `GNEWS_API_KEY` when set.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_country")]
    pub default_country: String,
    #[serde(default)]
    pub default_city: Option<String>,
    #[serde(default)]
    pub default_state: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: default_news_url(),
            api_key: None,
            default_country: default_country(),
            default_city: None,
            default_state: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_news_url() -> String {
    "https://gnews.io/api/v4/search".to_string()
}
fn default_country() -> String {
    "IN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScraperConfig {
    #[serde(default = "default_scraper_base")]
    pub base_url: String,
    #[serde(default = "default_search_path")]
    pub search_path: String,
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_scraper_base(),
            search_path: default_search_path(),
            page_timeout_secs: default_page_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_scraper_base() -> String {
    "https://www.indiacode.nic.in".to_string()
}
fn default_search_path() -> String {
    "/handle/123456789/1362/simple-search".to_string()
}
fn default_page_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

/// Lawyer directory. Without a `path` the built-in sample directory is used.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LawyersConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.default_k < 1 || config.retrieval.advice_k < 1 {
        bail!("retrieval.default_k and retrieval.advice_k must be >= 1");
    }
    if config.retrieval.max_k < config.retrieval.default_k {
        bail!("retrieval.max_k must be >= retrieval.default_k");
    }

    if config.summarizer.max_chunk_chars == 0 {
        bail!("summarizer.max_chunk_chars must be > 0");
    }
    if config.summarizer.min_length > config.summarizer.max_length {
        bail!("summarizer.min_length must not exceed summarizer.max_length");
    }

    if config.embedding.is_enabled() && config.embedding.provider != "local" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "gemini" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, gemini, or local.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "disabled" | "gemini" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, gemini, or ollama.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature)
        || !(0.0..=2.0).contains(&config.llm.compare_temperature)
    {
        bail!("llm temperatures must be in [0.0, 2.0]");
    }
    if !(0.0..=1.0).contains(&config.llm.top_p) {
        bail!("llm.top_p must be in [0.0, 1.0]");
    }

    Ok(())
}
