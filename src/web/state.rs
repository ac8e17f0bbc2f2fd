//! Shared handler state.

use std::sync::Arc;

use crate::coach::Coach;
use crate::config::Settings;
use crate::providers::ThreadRegistry;

/// Shared application state, cloned into every handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub coach: Arc<Coach>,
    pub threads: Arc<ThreadRegistry>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(coach: Arc<Coach>, threads: Arc<ThreadRegistry>, settings: Settings) -> Self {
        Self {
            coach,
            threads,
            settings: Arc::new(settings),
        }
    }
}
