//! Per-user conversation threads over a completion provider.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::provider::{ChatMessage, CompletionProvider, ProviderError, Result};

/// Conversation memory held for one user.
#[async_trait]
pub trait ConversationThread: Send {
    fn id(&self) -> &str;

    /// Prepare the thread. Returns `true` the first time it is called.
    async fn ensure(&mut self) -> Result<bool>;

    /// Add background context without asking anything.
    async fn append_context(&mut self, text: &str) -> Result<()>;

    /// Ask a question and return the assistant's reply.
    async fn ask(&mut self, query: &str) -> Result<String>;
}

pub const COACH_INSTRUCTIONS: &str = "You are a friendly, expert health coach. \
Remember prior user inputs and use the conversation so far when answering. \
Reference the user's health data and known facts only when directly relevant. \
Be concise: no more than 3 sentences, then an action-oriented follow-up question. \
Output a JSON object with exactly two keys: \"main\" (your answer) and \"question\" (your follow-up question).";

const MAX_HISTORY: usize = 40;

/// Thread whose memory is the in-process message history.
pub struct ProviderThread {
    id: String,
    provider: Arc<dyn CompletionProvider>,
    instructions: String,
    history: Vec<ChatMessage>,
    timeout: Duration,
    initialized: bool,
}

impl ProviderThread {
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self {
            id: format!("thread_{}", ulid::Ulid::new()),
            provider,
            instructions: COACH_INSTRUCTIONS.to_string(),
            history: Vec::new(),
            timeout,
            initialized: false,
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    fn trim_history(&mut self) {
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }
}

#[async_trait]
impl ConversationThread for ProviderThread {
    fn id(&self) -> &str {
        &self.id
    }

    async fn ensure(&mut self) -> Result<bool> {
        let fresh = !self.initialized;
        self.initialized = true;
        Ok(fresh)
    }

    async fn append_context(&mut self, text: &str) -> Result<()> {
        self.history.push(ChatMessage::user(text));
        self.trim_history();
        Ok(())
    }

    async fn ask(&mut self, query: &str) -> Result<String> {
        self.history.push(ChatMessage::user(query));

        let call = self.provider.submit(&self.instructions, &self.history);
        let reply = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.history.pop();
                return Err(e);
            }
            Err(_) => {
                self.history.pop();
                return Err(ProviderError::Timeout);
            }
        };

        self.history.push(ChatMessage::assistant(&reply));
        self.trim_history();
        Ok(reply)
    }
}

pub type SharedThread = Arc<Mutex<Box<dyn ConversationThread>>>;

/// Maps users to their conversation thread, created once and reused.
pub struct ThreadRegistry {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
    threads: Mutex<HashMap<String, SharedThread>>,
}

impl ThreadRegistry {
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            threads: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    pub async fn get_or_create(&self, user_id: &str) -> SharedThread {
        let mut threads = self.threads.lock().await;
        threads
            .entry(user_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(user_id, "Creating conversation thread");
                let thread: Box<dyn ConversationThread> =
                    Box::new(ProviderThread::new(self.provider.clone(), self.timeout));
                Arc::new(Mutex::new(thread))
            })
            .clone()
    }

    /// Drop a user's thread so the next chat starts fresh.
    pub async fn reset(&self, user_id: &str) -> bool {
        self.threads.lock().await.remove(user_id).is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that echoes the last message, or fails when told to.
    pub(crate) struct ScriptedProvider {
        pub reply: Option<String>,
        pub calls: AtomicUsize,
        pub delay: Duration,
    }

    impl ScriptedProvider {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            self.reply.is_some()
        }

        async fn submit(&self, _system: &str, _history: &[ChatMessage]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply
                .clone()
                .ok_or_else(|| ProviderError::ApiError("scripted failure".to_string()))
        }
    }

    #[tokio::test]
    async fn test_ask_records_history() {
        let provider = Arc::new(ScriptedProvider::replying("Drink water."));
        let mut thread = ProviderThread::new(provider.clone(), Duration::from_secs(1));

        assert!(thread.ensure().await.unwrap());
        assert!(!thread.ensure().await.unwrap());
        thread.append_context("User sleeps 6 hours").await.unwrap();

        let reply = thread.ask("Any tips?").await.unwrap();
        assert_eq!(reply, "Drink water.");
        assert_eq!(thread.history().len(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_ask_leaves_history_clean() {
        let mut thread =
            ProviderThread::new(Arc::new(ScriptedProvider::failing()), Duration::from_secs(1));
        assert!(thread.ask("hello?").await.is_err());
        assert!(thread.history().is_empty());
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let provider = ScriptedProvider {
            delay: Duration::from_millis(200),
            ..ScriptedProvider::replying("late")
        };
        let mut thread = ProviderThread::new(Arc::new(provider), Duration::from_millis(10));
        assert!(matches!(thread.ask("hi").await, Err(ProviderError::Timeout)));
    }

    #[tokio::test]
    async fn test_registry_reuses_and_resets() {
        let registry = ThreadRegistry::new(
            Arc::new(ScriptedProvider::replying("ok")),
            Duration::from_secs(1),
        );
        let a = registry.get_or_create("u1").await;
        let b = registry.get_or_create("u1").await;
        assert!(Arc::ptr_eq(&a, &b));

        assert!(registry.reset("u1").await);
        let c = registry.get_or_create("u1").await;
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!registry.reset("u2").await);
    }
}
