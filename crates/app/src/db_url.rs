use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbUrlError {
    #[error("invalid --db value: {0}")]
    Invalid(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared-cache URIs such as `sqlite:file:name?mode=memory&cache=shared`
/// name a connection target rather than a path on disk.
fn is_uri_target(url: &str) -> bool {
    url == "sqlite::memory:" || url.starts_with("sqlite:file:")
}

/// Turns `sqlite:relative.db` or a bare path into an absolute `sqlite://` URL.
/// In-memory and `file:` URIs pass through unchanged.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if is_uri_target(trimmed) || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Creates the database file and its parent directories if missing.
///
/// # Errors
///
/// Returns `DbUrlError::Invalid` for URLs without a file path, or
/// `DbUrlError::Io` if the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), DbUrlError> {
    if is_uri_target(db_url) {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| DbUrlError::Invalid(db_url.to_string()))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(DbUrlError::Invalid(db_url.to_string()));
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}
