//! HTTP surface (Axum).

pub mod api;
pub mod router;
pub mod server;
pub mod state;

pub use router::create_app_router;
pub use server::run_web_server;
pub use state::AppState;
