//! Narrative provider configuration, resolved once from the
//! environment. The rest of the crate only ever sees the resolved
//! selector and per-provider settings, never raw credentials.

use crate::llm::{GeminiClient, OpenAiClient, TextGenerator};
use std::env;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSelector {
    Local,
    OpenAi,
    Gemini,
}

impl ModelSelector {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "local" => Some(ModelSelector::Local),
            "openai" | "gpt" => Some(ModelSelector::OpenAi),
            "gemini" | "google" => Some(ModelSelector::Gemini),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSelector::Local => "local",
            ModelSelector::OpenAi => "openai",
            ModelSelector::Gemini => "gemini",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub enabled: bool,
}

impl ProviderSettings {
    fn from_env(key_var: &str, url_var: &str, default_url: &str, model_var: &str, default_model: &str) -> Self {
        let api_key = env::var(key_var).unwrap_or_default();
        Self {
            enabled: !api_key.is_empty(),
            api_key,
            base_url: env::var(url_var).unwrap_or_else(|_| default_url.to_string()),
            model: env::var(model_var).unwrap_or_else(|_| default_model.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    pub selector: ModelSelector,
    pub openai: ProviderSettings,
    pub gemini: ProviderSettings,
    pub timeout: Duration,
}

impl NarrativeConfig {
    /// Read `.env` and the process environment. Unknown or disabled
    /// selections degrade to the local templates.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let selector = env::var("SHOPSIGHT_AI_MODEL")
            .ok()
            .and_then(|raw| ModelSelector::parse(&raw))
            .unwrap_or(ModelSelector::Local);

        let timeout_secs = env::var("SHOPSIGHT_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(20);

        Self {
            selector,
            openai: ProviderSettings::from_env(
                "OPENAI_API_KEY",
                "OPENAI_BASE_URL",
                "https://api.openai.com/v1",
                "OPENAI_MODEL",
                "gpt-4o-mini",
            ),
            gemini: ProviderSettings::from_env(
                "GEMINI_API_KEY",
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
                "GEMINI_MODEL",
                "gemini-1.5-flash",
            ),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_selector(mut self, selector: ModelSelector) -> Self {
        self.selector = selector;
        self
    }

    /// The selector after the enabled check: a remote choice without a
    /// key degrades to local.
    pub fn resolved_selector(&self) -> ModelSelector {
        match self.selector {
            ModelSelector::OpenAi if !self.openai.enabled => {
                warn!("openai selected but no API key configured, using local templates");
                ModelSelector::Local
            }
            ModelSelector::Gemini if !self.gemini.enabled => {
                warn!("gemini selected but no API key configured, using local templates");
                ModelSelector::Local
            }
            other => other,
        }
    }

    /// Build the remote provider, if one is selected and enabled.
    pub fn remote_provider(&self) -> Option<Box<dyn TextGenerator>> {
        match self.resolved_selector() {
            ModelSelector::Local => None,
            ModelSelector::OpenAi => Some(Box::new(OpenAiClient::new(
                self.openai.api_key.clone(),
                self.openai.model.clone(),
                self.openai.base_url.clone(),
                self.timeout,
            ))),
            ModelSelector::Gemini => Some(Box::new(GeminiClient::new(
                self.gemini.api_key.clone(),
                self.gemini.model.clone(),
                self.gemini.base_url.clone(),
                self.timeout,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parsing_accepts_aliases() {
        assert_eq!(ModelSelector::parse("GPT"), Some(ModelSelector::OpenAi));
        assert_eq!(ModelSelector::parse("google"), Some(ModelSelector::Gemini));
        assert_eq!(ModelSelector::parse("local"), Some(ModelSelector::Local));
        assert_eq!(ModelSelector::parse("claude"), None);
    }

    #[test]
    fn disabled_provider_degrades_to_local() {
        let config = NarrativeConfig {
            selector: ModelSelector::OpenAi,
            openai: ProviderSettings {
                api_key: String::new(),
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                enabled: false,
            },
            gemini: ProviderSettings {
                api_key: "k".to_string(),
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-1.5-flash".to_string(),
                enabled: true,
            },
            timeout: Duration::from_secs(5),
        };
        assert_eq!(config.resolved_selector(), ModelSelector::Local);
        assert!(config.remote_provider().is_none());

        let config = config.with_selector(ModelSelector::Gemini);
        assert_eq!(config.resolved_selector(), ModelSelector::Gemini);
        assert!(config.remote_provider().is_some());
    }
}
