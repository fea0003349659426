//! Sandbox binary installation
//!
//! The binary is installed on first use and left alone afterwards.

use anyhow::{Context, Result};
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Installs the sandbox binary at most once per process
#[derive(Debug)]
pub struct SandboxInstaller {
    target: PathBuf,
    source: Option<PathBuf>,
    installed: OnceCell<PathBuf>,
}

impl SandboxInstaller {
    pub fn new(target: impl Into<PathBuf>, source: Option<PathBuf>) -> Self {
        Self {
            target: target.into(),
            source,
            installed: OnceCell::new(),
        }
    }

    /// Path of the usable binary, installing it if needed.
    ///
    /// Concurrent callers wait for a single install; a failed install is
    /// retried by the next caller.
    pub async fn ensure_installed(&self) -> Result<&Path> {
        let path = self.installed.get_or_try_init(|| self.install()).await?;
        Ok(path.as_path())
    }

    async fn install(&self) -> Result<PathBuf> {
        if fs::try_exists(&self.target).await.unwrap_or(false) {
            debug!("Sandbox binary already present at {:?}", self.target);
            return Ok(self.target.clone());
        }

        let source = self.source.as_ref().with_context(|| {
            format!(
                "Sandbox binary {:?} is missing and no install source is configured",
                self.target
            )
        })?;

        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        fs::copy(source, &self.target)
            .await
            .with_context(|| format!("Failed to copy {:?} to {:?}", source, self.target))?;

        fs::set_permissions(&self.target, Permissions::from_mode(0o755))
            .await
            .with_context(|| format!("Failed to make {:?} executable", self.target))?;

        info!("Installed sandbox binary at {:?}", self.target);
        Ok(self.target.clone())
    }
}
