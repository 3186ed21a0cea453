//! Token file storage
//!
//! The token file holds a single `TokenRecord` as JSON. It is read when a
//! file-backed strategy runs and rewritten in place after a successful
//! refresh. Writes use atomic temp-file + rename so a crash mid-write never
//! leaves a truncated token behind.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::token::TokenRecord;

/// Location of a persisted token record.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file exists and is non-empty.
    pub async fn exists(&self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    /// Read and parse the token record.
    pub async fn load(&self) -> Result<TokenRecord> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Error::NotFound(format!("token file {}", self.path.display()))
                }
                _ => Error::Io(format!("reading token file {}: {e}", self.path.display())),
            })?;
        let record: TokenRecord = serde_json::from_str(&contents)
            .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))?;
        debug!(path = %self.path.display(), "loaded token file");
        Ok(record)
    }

    /// Overwrite the file with `record`.
    pub async fn save(&self, record: &TokenRecord) -> Result<()> {
        write_atomic(&self.path, record).await
    }
}

/// Write a token record atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Permissions are 0600 (owner read/write only) since the file
/// contains OAuth tokens.
async fn write_atomic(path: &Path, record: &TokenRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| Error::CredentialParse(format!("serializing token record: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("token path has no file name".into()))?
        .to_string_lossy();

    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token file");
    Ok(())
}
