//! Token authentication module.
//!
//! Validates a shared-secret token presented in a configurable HTTP header
//! against a JSON credentials file mapping usernames to tokens:
//!
//! ```json
//! { "alice": "token-123", "bob": "token-456" }
//! ```
//!
//! The credentials file is re-read lazily whenever its modification time
//! changes, so operators can rotate tokens without restarting the service.
//! When no file is configured the authenticator stays disabled and the
//! service runs in open-access mode.
//!
//! ## Error Model
//!
//! - [`AuthError::Configuration`]: operator-facing (500); the file is
//!   missing, malformed, or empty
//! - [`AuthError::MissingToken`]: client-facing (401); no token presented
//! - [`AuthError::UnrecognizedToken`]: client-facing (403); unknown token

mod authenticator;

pub use authenticator::{AuthError, TokenAuthenticator};
