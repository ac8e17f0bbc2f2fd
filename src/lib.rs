//! HabitCoach library root.

pub mod checkin;
pub mod cli;
pub mod coach;
pub mod config;
pub mod error;
pub mod goals;
pub mod habits;
pub mod logging;
pub mod outbox;
pub mod providers;
pub mod scheduler;
pub mod storage;
pub mod web;

pub use cli::Commands;
pub use coach::Coach;
pub use config::{load_settings, load_settings_or_default, Settings};
pub use error::{Error, Result};
pub use web::run_web_server;
