//! Text generation providers.
//!
//! [`TextGenerator`] is the seam every prompt-driven feature goes through
//! (advice, law comparison, summaries, will extraction, the IVR assistant).
//! Implementations:
//!
//! - **[`GeminiGenerator`]**: Google Generative Language `generateContent`.
//! - **[`OllamaGenerator`]**: a local Ollama `/api/generate` endpoint.
//! - **[`DisabledGenerator`]**: always errors; used when `[llm] provider = "disabled"`.
//!
//! Requests go through [`crate::http::post_json_with_retry`], so rate limits
//! and 5xx replies are retried with exponential backoff.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::http;

/// Sampling options for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    /// Optional system instruction.
    pub system: Option<String>,
}

impl GenerationOptions {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
            system: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

/// Prompt → text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}

pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
        bail!("LLM provider is disabled. Set [llm] provider in config.")
    }
}

// ============ Gemini ============

pub struct GeminiGenerator {
    model: String,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!(
                "{} environment variable not set (required for the gemini llm provider)",
                config.api_key_env
            )
        })?;
        Ok(Self {
            model: config.model.clone(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            api_key,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

/// Request body for `generateContent`.
fn gemini_body(prompt: &str, options: &GenerationOptions) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": options.temperature,
            "topP": options.top_p,
            "topK": options.top_k,
            "maxOutputTokens": options.max_output_tokens,
        }
    });
    if let Some(system) = &options.system {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

/// Concatenate the text parts of the first candidate.
fn gemini_text(response: &Value) -> Result<String> {
    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .context("Gemini response has no candidates")?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        bail!("Gemini response contained no text");
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        debug!(model = %self.model, prompt_chars = prompt.len(), "gemini generate");
        let response = http::post_json_with_retry(
            &self.client,
            &url,
            &[("x-goog-api-key", self.api_key.clone())],
            &gemini_body(prompt, options),
            self.max_retries,
            "Gemini",
        )
        .await?;
        gemini_text(&response)
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    model: String,
    base_url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

fn ollama_body(model: &str, prompt: &str, options: &GenerationOptions) -> Value {
    let mut body = json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
        "options": {
            "temperature": options.temperature,
            "top_p": options.top_p,
            "top_k": options.top_k,
            "num_predict": options.max_output_tokens,
        }
    });
    if let Some(system) = &options.system {
        body["system"] = json!(system);
    }
    body
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let response = http::post_json_with_retry(
            &self.client,
            &url,
            &[],
            &ollama_body(&self.model, prompt, options),
            self.max_retries,
            "Ollama",
        )
        .await?;
        response["response"]
            .as_str()
            .map(str::to_string)
            .context("Ollama response missing 'response'")
    }
}

/// Create the [`TextGenerator`] named by `config.provider`.
pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
