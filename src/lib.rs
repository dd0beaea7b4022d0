// Core modules
pub mod api;
mod auth;
mod config;
mod store;

// Re-export key types and functions
pub use auth::{AuthError, TokenAuthenticator};
pub use config::CollectorConfig;
pub use store::{
    EventRecord, LogStore, StoreError, rotate_file_if_needed, sanitize_project_name,
};

use std::sync::Arc;

use axum::Router;

/// Convenience function to build the collector router from configuration.
///
/// Constructs the token authenticator (failing on a broken credentials file
/// when one is configured) and the log store, then wires them into the HTTP
/// router.
pub fn create_app(config: &CollectorConfig) -> Result<Router, AuthError> {
    let authenticator = TokenAuthenticator::new(
        config.authorized_tokens_file.clone(),
        config.token_header_name.clone(),
        config.authorized_tokens_file.is_some(),
    )?;
    let store = LogStore::new(config.data_dir.clone(), config.max_file_size);

    Ok(api::create_router(Arc::new(api::AppState {
        authenticator,
        store,
    })))
}
