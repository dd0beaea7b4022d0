//! Collector configuration.
//!
//! Configuration is resolved by the CLI (see `src/bin/main.rs`) from flags
//! and environment variables, then handed to the library as a plain struct.
//!
//! # Environment Variables
//!
//! - `DATA_DIR`: directory for project log files (default: `/run/collector`)
//! - `MAX_JSONL_FILE_SIZE`: rotation threshold in bytes (default: `52428800`)
//! - `AUTHORIZED_TOKENS_FILE`: path to the credentials file; when set, the
//!   file must exist and parse at startup or the process exits
//! - `JSON_COLLECTOR_TOKEN_HEADER`: header checked for the client token
//!   (default: `X-JSON-Collector-Token`)

use std::path::PathBuf;

/// Runtime configuration for the collector service.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Root directory for all project log files.
    pub data_dir: PathBuf,
    /// Size threshold in bytes at which a project log file is rotated.
    pub max_file_size: u64,
    /// Optional path to the authorized tokens file. Setting this enables
    /// token authentication and makes the file required at startup.
    pub authorized_tokens_file: Option<PathBuf>,
    /// Name of the HTTP header carrying the client token.
    pub token_header_name: String,
}

impl CollectorConfig {
    /// Default directory for project log files.
    pub const DEFAULT_DATA_DIR: &'static str = "/run/collector";
    /// Default rotation threshold (50 MiB).
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 52_428_800;
    /// Default token header name.
    pub const DEFAULT_TOKEN_HEADER: &'static str = "X-JSON-Collector-Token";
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(Self::DEFAULT_DATA_DIR),
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            authorized_tokens_file: None,
            token_header_name: Self::DEFAULT_TOKEN_HEADER.to_string(),
        }
    }
}
