//! Credential Persistence
//!
//! Storage state is written to a temporary file next to the target and then
//! renamed over it, so readers never observe a half-written credential file.

use crate::browser::StorageState;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Could not create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not write credential file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not read credential file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Credential file {path} is not valid storage state: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not serialize storage state: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "credentials".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

/// Write `state` to `path` atomically, creating parent directories
pub async fn write_storage_state(path: &Path, state: &StorageState) -> Result<(), CredentialError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| CredentialError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let json = serde_json::to_vec_pretty(state)?;
    let temp_path = temp_path_for(path);

    let result = write_then_rename(&temp_path, path, &json).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove {}: {}", temp_path.display(), e);
            }
        }
    }
    result.map_err(|source| CredentialError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        path = %path.display(),
        cookies = state.cookies.len(),
        origins = state.origins.len(),
        "Credential file written"
    );
    Ok(())
}

async fn write_then_rename(temp_path: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(temp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(temp_path, path).await
}

/// Load a credential file written by [`write_storage_state`] (or by Playwright)
pub async fn read_storage_state(path: &Path) -> Result<StorageState, CredentialError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_slice(&bytes).map_err(|source| CredentialError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
