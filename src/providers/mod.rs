//! Conversational AI collaborator.

use std::sync::Arc;
use std::time::Duration;

pub mod openai;
pub mod provider;
pub mod reply;
pub mod thread;

pub use provider::{ChatMessage, CompletionProvider, OfflineProvider, ProviderError, Result};
pub use reply::{split_reply, ChatReply};
pub use thread::{ConversationThread, SharedThread, ThreadRegistry};

use crate::config::Settings;

/// Provider factory.
pub fn create_provider(settings: &Settings) -> Arc<dyn CompletionProvider> {
    let ai = &settings.ai;
    match (ai.provider.as_str(), ai.api_key.as_deref()) {
        ("openai", Some(key)) => {
            match openai::OpenAiProvider::new(
                key,
                ai.base_url.clone(),
                ai.model.clone(),
                Duration::from_secs(ai.timeout_seconds),
            ) {
                Ok(provider) => Arc::new(provider),
                Err(e) => {
                    tracing::warn!("Failed to build OpenAI provider: {}, chat disabled", e);
                    Arc::new(OfflineProvider)
                }
            }
        }
        (name, _) => {
            tracing::warn!(provider = name, "No usable AI provider configured, chat disabled");
            Arc::new(OfflineProvider)
        }
    }
}

/// Thread registry for the configured provider.
pub fn create_thread_registry(settings: &Settings) -> ThreadRegistry {
    ThreadRegistry::new(
        create_provider(settings),
        Duration::from_secs(settings.ai.timeout_seconds),
    )
}
