//! Per-project append-only JSONL log storage.
//!
//! Each project maps to one file, `<data_dir>/<sanitized>.jsonl`. Writes
//! append a single JSON line; when the file reaches the size threshold it is
//! renamed to the lowest unused `<name>.<N>.jsonl` backup and a fresh file
//! starts at the original path. Backups are never touched again.

mod record;

pub use record::{EventRecord, REDACTED_PLACEHOLDER};

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

/// Extension shared by the current log file and its numbered backups.
pub const LOG_FILE_EXTENSION: &str = "jsonl";

/// Storage errors.
#[derive(Debug)]
pub enum StoreError {
    /// No log file exists yet for the requested project.
    NotFound(String),
    /// Filesystem failure while rotating, appending, or reading.
    Io(io::Error),
    /// The record could not be encoded as JSON.
    Encode(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(project) => write!(f, "No log file for project '{}'", project),
            Self::Io(err) => write!(f, "Log file I/O error: {}", err),
            Self::Encode(err) => write!(f, "Failed to encode record: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Drop every character outside `[A-Za-z0-9]` so a project name is always a
/// safe file basename. Read and write paths go through the same mapping, so
/// a logical project maps to exactly one file.
pub fn sanitize_project_name(project: &str) -> String {
    project
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Rename `path` to the lowest-numbered unused `<base>.<N>.<ext>` backup once
/// its size is at or over `max_size`. No-op when the file is absent or still
/// under the threshold. Rotation is a pure rename, so prior backups are never
/// overwritten and the operation is atomic on a single filesystem.
pub fn rotate_file_if_needed(path: &Path, max_size: u64) -> Result<(), StoreError> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(StoreError::Io(err)),
    };
    if size < max_size {
        return Ok(());
    }

    let mut backup_number = 1u32;
    let backup = loop {
        let candidate = backup_path(path, backup_number);
        if !candidate.exists() {
            break candidate;
        }
        backup_number += 1;
    };

    info!(
        from = %path.display(),
        to = %backup.display(),
        size,
        "Rotating log file"
    );
    fs::rename(path, &backup)?;
    Ok(())
}

fn backup_path(path: &Path, number: u32) -> PathBuf {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => path.with_extension(format!("{}.{}", number, ext)),
        None => path.with_extension(number.to_string()),
    }
}

/// Write path for project event logs.
#[derive(Debug, Clone)]
pub struct LogStore {
    data_dir: PathBuf,
    max_file_size: u64,
}

impl LogStore {
    pub fn new(data_dir: PathBuf, max_file_size: u64) -> Self {
        Self {
            data_dir,
            max_file_size,
        }
    }

    /// On-disk path for a project's current log file.
    pub fn log_path(&self, project: &str) -> PathBuf {
        self.data_dir.join(format!(
            "{}.{}",
            sanitize_project_name(project),
            LOG_FILE_EXTENSION
        ))
    }

    /// Rotate if needed, then append `record` as one JSON line.
    ///
    /// Creates the file on first append. Either the whole operation succeeds
    /// or the previous file state is left as the last fully-written state.
    pub fn append(&self, project: &str, record: &EventRecord) -> Result<(), StoreError> {
        let path = self.log_path(project);
        rotate_file_if_needed(&path, self.max_file_size)?;

        let mut line = serde_json::to_string(record).map_err(StoreError::Encode)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Contents of a project's current log file.
    pub fn read(&self, project: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.log_path(project);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(project.to_string()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}
