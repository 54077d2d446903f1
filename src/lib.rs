pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod routes;
pub mod security;
pub mod validation;
pub mod views;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
