//! Bearer token storage.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Source of the bearer token sent with every backend request.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store name for logs (e.g. "file").
    fn name(&self) -> &str;

    /// The current token, or `None` when signed out.
    async fn token(&self) -> Result<Option<String>>;
}

/// A token fixed by configuration or the environment.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken").field("token", &"***").finish()
    }
}

#[async_trait]
impl TokenStore for StaticToken {
    fn name(&self) -> &str {
        "config"
    }

    async fn token(&self) -> Result<Option<String>> {
        Ok(Some(self.token.clone()))
    }
}

/// A token persisted in a file, re-read on every request so a token written
/// by `lessonkit token set` is picked up without a restart.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `token`, creating parent directories. The file is private to the
    /// user on Unix.
    pub async fn save(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            anyhow::bail!("token is empty");
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&self.path, format!("{token}\n"))
            .await
            .with_context(|| format!("failed to write token to {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .with_context(|| format!("failed to restrict {}", self.path.display()))?;
        }
        tracing::debug!("token saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the stored token. Returns `false` if there was none.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn token(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("failed to read token from {}", self.path.display())),
        }
    }
}

/// Show only the first and last few characters of a token.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
