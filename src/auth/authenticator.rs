//! File-backed token authenticator with mtime-gated reload.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Authentication errors.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// The credentials file is missing, unreadable, malformed, or empty.
    /// Operator-facing; surfaced to clients as a generic 500.
    Configuration(String),
    /// The token header was absent or blank.
    MissingToken { header: String },
    /// The presented token is not in the credentials file.
    UnrecognizedToken,
}

impl AuthError {
    /// HTTP status for this error, so callers match on kind rather than type.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingToken { .. } => StatusCode::UNAUTHORIZED,
            Self::UnrecognizedToken => StatusCode::FORBIDDEN,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "{}", msg),
            Self::MissingToken { header } => {
                write!(f, "Missing required token header '{}'", header)
            }
            Self::UnrecognizedToken => write!(f, "Provided token is not recognized"),
        }
    }
}

impl std::error::Error for AuthError {}

/// State replaced atomically by a reload.
#[derive(Debug, Default)]
struct TokenState {
    /// token -> username
    tokens_by_value: HashMap<String, String>,
    enabled: bool,
    last_mtime: Option<SystemTime>,
}

/// Header-token authenticator backed by a JSON credentials file.
///
/// Constructed once at startup and shared across handlers. Everything except
/// the reload-managed state is immutable for the authenticator's lifetime.
#[derive(Debug)]
pub struct TokenAuthenticator {
    file_path: Option<PathBuf>,
    header_name: String,
    state: RwLock<TokenState>,
}

impl TokenAuthenticator {
    /// Create a new authenticator.
    ///
    /// With no `file_path` (or a path that does not exist), `require_file`
    /// decides between a configuration error and running with authentication
    /// disabled. Otherwise the credentials file is loaded immediately.
    pub fn new(
        file_path: Option<PathBuf>,
        header_name: String,
        require_file: bool,
    ) -> Result<Self, AuthError> {
        // An empty path is the same as no path at all.
        let file_path = file_path.filter(|path| !path.as_os_str().is_empty());
        let Some(path) = file_path else {
            if require_file {
                return Err(AuthError::Configuration(
                    "Authorized tokens file path not provided".to_string(),
                ));
            }
            return Ok(Self::disabled(None, header_name));
        };

        if !path.exists() {
            if require_file {
                return Err(AuthError::Configuration(format!(
                    "Authorized tokens file not found at {}",
                    path.display()
                )));
            }
            return Ok(Self::disabled(Some(path), header_name));
        }

        let mtime = file_mtime(&path)?;
        let tokens_by_value = parse_token_file(&path)?;
        info!(
            path = %path.display(),
            tokens = tokens_by_value.len(),
            "Token authentication enabled"
        );

        Ok(Self {
            file_path: Some(path),
            header_name,
            state: RwLock::new(TokenState {
                tokens_by_value,
                enabled: true,
                last_mtime: Some(mtime),
            }),
        })
    }

    fn disabled(file_path: Option<PathBuf>, header_name: String) -> Self {
        Self {
            file_path,
            header_name,
            state: RwLock::new(TokenState::default()),
        }
    }

    /// Name of the header checked for the token.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Whether authentication is currently active. Callers skip the token
    /// check entirely when this is false (open-access mode).
    pub async fn is_enabled(&self) -> bool {
        self.state.read().await.enabled
    }

    /// Re-read the credentials file if its mtime changed since the last load.
    ///
    /// No-op without a configured path. The mtime gate avoids a read + parse
    /// on every request; `force` bypasses it.
    pub async fn reload(&self, force: bool) -> Result<(), AuthError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        if !path.exists() {
            return Err(AuthError::Configuration(format!(
                "Authorized tokens file not found at {}",
                path.display()
            )));
        }

        let mtime = file_mtime(path)?;
        {
            let state = self.state.read().await;
            if !force && state.last_mtime == Some(mtime) {
                return Ok(());
            }
        }

        let tokens_by_value = parse_token_file(path)?;
        debug!(
            path = %path.display(),
            tokens = tokens_by_value.len(),
            "Reloaded authorized tokens file"
        );

        let mut state = self.state.write().await;
        state.tokens_by_value = tokens_by_value;
        state.enabled = true;
        state.last_mtime = Some(mtime);
        Ok(())
    }

    /// Validate the token header on the given request headers and return the
    /// mapped username.
    ///
    /// Triggers a (non-forced) reload first so freshly rotated credentials
    /// take effect without a restart.
    pub async fn authenticated_username(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        self.reload(false).await?;

        let token = headers
            .get(self.header_name.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AuthError::MissingToken {
                header: self.header_name.clone(),
            })?;

        let state = self.state.read().await;
        state
            .tokens_by_value
            .get(token)
            .cloned()
            .ok_or(AuthError::UnrecognizedToken)
    }
}

fn file_mtime(path: &Path) -> Result<SystemTime, AuthError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|err| {
            AuthError::Configuration(format!(
                "Failed to stat authorized tokens file {}: {}",
                path.display(),
                err
            ))
        })
}

/// Parse the credentials file into a token -> username map.
///
/// The file must be a JSON object of non-blank string usernames to non-blank
/// string tokens. A token mapped to two usernames is rejected rather than
/// letting one entry silently win.
fn parse_token_file(path: &Path) -> Result<HashMap<String, String>, AuthError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        AuthError::Configuration(format!(
            "Failed to read authorized tokens file {}: {}",
            path.display(),
            err
        ))
    })?;

    let parsed: Value = serde_json::from_str(&raw).map_err(|_| {
        AuthError::Configuration(format!(
            "Authorized tokens file at {} is not valid JSON",
            path.display()
        ))
    })?;

    let Value::Object(entries) = parsed else {
        return Err(AuthError::Configuration(
            "Authorized tokens file must contain a JSON object mapping usernames to tokens"
                .to_string(),
        ));
    };

    let mut tokens_by_value = HashMap::with_capacity(entries.len());
    for (username, token) in entries {
        let Value::String(token) = token else {
            return Err(AuthError::Configuration(
                "Authorized tokens file must map string usernames to string tokens".to_string(),
            ));
        };

        let username = username.trim();
        let token = token.trim();
        if username.is_empty() || token.is_empty() {
            return Err(AuthError::Configuration(
                "Authorized tokens file contains blank usernames or tokens".to_string(),
            ));
        }

        if let Some(previous) = tokens_by_value.insert(token.to_string(), username.to_string()) {
            return Err(AuthError::Configuration(format!(
                "Authorized tokens file maps the same token to '{}' and '{}'",
                previous, username
            )));
        }
    }

    if tokens_by_value.is_empty() {
        return Err(AuthError::Configuration(
            "Authorized tokens file is empty".to_string(),
        ));
    }

    Ok(tokens_by_value)
}
