//! Text-completion provider trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<ProviderError> for crate::error::Error {
    fn from(e: ProviderError) -> Self {
        crate::error::Error::Upstream(e.to_string())
    }
}

/// One turn of conversation history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

/// Conversational AI service.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name.
    fn name(&self) -> &str;

    /// Check if the provider is configured and reachable.
    async fn is_available(&self) -> bool;

    /// Submit instructions plus history; returns the assistant's text.
    async fn submit(&self, system_instructions: &str, history: &[ChatMessage]) -> Result<String>;
}

/// Provider used when no AI backend is configured. Every call fails.
pub struct OfflineProvider;

#[async_trait]
impl CompletionProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn submit(&self, _system_instructions: &str, _history: &[ChatMessage]) -> Result<String> {
        Err(ProviderError::NotAvailable(
            "no AI provider configured".to_string(),
        ))
    }
}
