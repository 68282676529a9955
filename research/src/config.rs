use agent::llm::{self, Anthropic, OpenAI};
use agent::{Error, Result};
use clap::{Args, ValueEnum};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Anthropic,
    Openai,
}

impl Provider {
    fn key_var(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Openai => "OPENAI_API_KEY",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-sonnet-4-5-20250929",
            Provider::Openai => "gpt-4o-search-preview",
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Llm provider to send searches to
    #[arg(long, value_enum, default_value_t = Provider::Anthropic)]
    pub provider: Provider,

    /// Model id, defaults to the provider's search capable model
    #[arg(long)]
    pub model: Option<String>,

    /// Api key, read from ANTHROPIC_API_KEY or OPENAI_API_KEY when omitted
    #[arg(long)]
    pub api_key: Option<String>,

    /// Override the provider's base url
    #[arg(long)]
    pub api_base: Option<String>,
}

/// Validated connection settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub api_base: Option<String>,
}

impl Config {
    pub fn resolve(&self) -> Result<Connection> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<Connection> {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| env(self.provider.key_var()))
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "no api key given, pass --api-key or set {}",
                    self.provider.key_var()
                ))
            })?;

        let model = self
            .model
            .clone()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_model().to_string());

        Ok(Connection {
            provider: self.provider,
            model,
            api_key,
            api_base: self.api_base.clone(),
        })
    }
}

impl Connection {
    pub fn llm(&self) -> Result<Arc<dyn llm::LLM + Send + Sync>> {
        let llm: Arc<dyn llm::LLM + Send + Sync> = match self.provider {
            Provider::Anthropic => Anthropic::new(
                self.model.clone(),
                self.api_key.clone(),
                self.api_base.clone(),
            )?,
            Provider::Openai => OpenAI::new(
                self.model.clone(),
                self.api_key.clone(),
                self.api_base.clone(),
            )?,
        };
        Ok(llm)
    }
}
