//! Infrastructure implementation of the `KeyMaterialStore` port.
//!
//! One PEM file per key pair under `<wincloud home>/keys/`, directory 0700
//! and files 0600 on Unix. Files are created with `create_new`, so an
//! existing key is never overwritten.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::KeyMaterialStore;
use crate::domain::KeyMaterial;
use crate::infra::paths::wincloud_home;

/// Filesystem key store.
#[derive(Debug, Clone)]
pub struct FsKeyStore {
    dir: PathBuf,
}

impl FsKeyStore {
    /// Store at the default location (`<wincloud home>/keys`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_dir(wincloud_home()?.join("keys")))
    }

    #[must_use]
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Path of the key file for `key_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key_name` could escape the key directory.
    pub fn key_path(&self, key_name: &str) -> Result<PathBuf> {
        anyhow::ensure!(
            !key_name.is_empty()
                && key_name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "invalid key name: {key_name}"
        );
        Ok(self.dir.join(format!("{key_name}.pem")))
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating directory {}", self.dir.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700))
                .with_context(|| format!("setting permissions on {}", self.dir.display()))?;
        }
        Ok(())
    }

    fn write_sync(&self, key: &KeyMaterial) -> Result<()> {
        self.ensure_dir()?;
        let path = self.key_path(&key.name)?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&path)
            .with_context(|| format!("creating key file {}", path.display()))?;
        file.write_all(key.private_key_pem.as_bytes())
            .with_context(|| format!("writing key file {}", path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing key file {}", path.display()))
    }
}

impl KeyMaterialStore for FsKeyStore {
    async fn exists(&self, key_name: &str) -> Result<bool> {
        let path = self.key_path(key_name)?;
        tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("checking {}", path.display()))
    }

    async fn read(&self, key_name: &str) -> Result<Option<KeyMaterial>> {
        let path = self.key_path(key_name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(pem) => Ok(Some(KeyMaterial {
                name: key_name.to_string(),
                private_key_pem: pem,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading key file {}", path.display())),
        }
    }

    async fn write(&self, key: &KeyMaterial) -> Result<()> {
        let store = self.clone();
        let key = key.clone();
        tokio::task::spawn_blocking(move || store.write_sync(&key))
            .await
            .context("key write task panicked")?
    }

    async fn remove(&self, key_name: &str) -> Result<bool> {
        let path = self.key_path(key_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing key file {}", path.display())),
        }
    }
}
