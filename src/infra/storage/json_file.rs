// Shared helpers for the JSON file stores.
//
// Each store keeps its whole file in memory and rewrites it after every
// change. A missing or unreadable file starts out empty rather than failing
// startup; an unreadable one is copied aside first so the next write can't
// destroy it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read `path`, falling back to `T::default()` when the file is missing or
/// does not parse. A file that exists but does not parse is copied to
/// [`backup_path`] before the default is returned.
pub fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return T::default();
    }

    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!("Failed to open {}: {}", path.display(), e);
            return T::default();
        }
    };

    match serde_json::from_reader(std::io::BufReader::new(file)) {
        Ok(value) => value,
        Err(e) => {
            let backup = backup_path(path);
            match std::fs::copy(path, &backup) {
                Ok(_) => tracing::warn!(
                    "Ignoring unreadable {} (copied to {}): {}",
                    path.display(),
                    backup.display(),
                    e
                ),
                Err(copy_err) => tracing::error!(
                    "Ignoring unreadable {} and could not back it up: {} ({})",
                    path.display(),
                    e,
                    copy_err
                ),
            }
            T::default()
        }
    }
}

/// Where an unreadable store file is copied, e.g. `warnings.json.bak`.
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Write `value` as pretty JSON, creating parent directories as needed.
pub fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
