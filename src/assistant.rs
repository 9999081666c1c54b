//! Conversational IVR assistant.

use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;

use crate::llm::{GenerationOptions, TextGenerator};

/// Where the caller is in the IVR menu, and which language to answer in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantContext {
    #[serde(default)]
    pub current_path: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for AssistantContext {
    fn default() -> Self {
        Self {
            current_path: Vec::new(),
            language: default_language(),
        }
    }
}

/// `en` answers in English; any other code answers in Hindi.
pub fn response_language(code: &str) -> &'static str {
    if code == "en" {
        "English"
    } else {
        "Hindi"
    }
}

pub fn assistant_prompt(input: &str, context: &AssistantContext) -> String {
    format!(
        "You are a legal assistance IVR system. The user has provided the following input: \"{input}\"\n\
         Current navigation path: {path}\n\
         Language: {language}\n\n\
         Provide a natural, conversational response that:\n\
         1. Acknowledges their input\n\
         2. Provides relevant legal information\n\
         3. Offers clear next steps or options\n\
         4. Keeps responses concise and clear\n\n\
         Respond in {respond_in}.",
        input = input,
        path = context.current_path.join(" > "),
        language = context.language,
        respond_in = response_language(&context.language),
    )
}

pub struct LegalAssistant {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
}

impl LegalAssistant {
    pub fn new(generator: Arc<dyn TextGenerator>, options: GenerationOptions) -> Self {
        Self { generator, options }
    }

    pub async fn reply(&self, input: &str, context: &AssistantContext) -> Result<String> {
        self.generator
            .generate(&assistant_prompt(input, context), &self.options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for Recorder {
        fn model_name(&self) -> &str {
            "recorder"
        }
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Namaste, how can I help?".to_string())
        }
    }

    #[test]
    fn test_prompt_path_and_language() {
        let ctx = AssistantContext {
            current_path: vec!["main".into(), "property".into(), "rent".into()],
            language: "hi".into(),
        };
        let p = assistant_prompt("my landlord kept the deposit", &ctx);
        assert!(p.starts_with(
            "You are a legal assistance IVR system. The user has provided the following input: \"my landlord kept the deposit\"\n"
        ));
        assert!(p.contains("Current navigation path: main > property > rent\n"));
        assert!(p.contains("Language: hi\n"));
        assert!(p.ends_with("Respond in Hindi."));
    }

    #[test]
    fn test_context_defaults() {
        let ctx: AssistantContext = serde_json::from_str(r#"{"currentPath": ["main"]}"#).unwrap();
        assert_eq!(ctx.language, "en");
        assert!(assistant_prompt("hello", &ctx).ends_with("Respond in English."));
        assert!(assistant_prompt("hello", &AssistantContext::default())
            .contains("Current navigation path: \n"));
    }

    #[tokio::test]
    async fn test_reply_passes_prompt_through() {
        let recorder = Arc::new(Recorder::default());
        let assistant = LegalAssistant::new(recorder.clone(), GenerationOptions::default());
        let text = assistant
            .reply("hello", &AssistantContext::default())
            .await
            .unwrap();
        assert_eq!(text, "Namaste, how can I help?");
        let prompts = recorder.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("\"hello\""));
    }
}
