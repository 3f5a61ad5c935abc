pub mod app;
pub mod auth_handlers;
pub mod config;
pub mod metrics;
pub mod password;
pub mod role_handlers;
pub mod service;
pub mod store;
pub mod tokens;
pub mod user_handlers;

pub use app::{build_router, AppState};
