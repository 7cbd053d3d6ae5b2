//! Infrastructure implementation of the `InstanceRecordStore` port.
//!
//! `JsonRecordStore` keeps every record in one `instances.json`, loaded and
//! saved through `tokio::task::spawn_blocking` with an atomic write (temp
//! file + rename) so a crash mid-write never corrupts existing records.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use wincloud_common::ManagedInstance;

use crate::application::ports::InstanceRecordStore;
use crate::infra::paths::wincloud_home;

const RECORDS_FILE: &str = "instances.json";

/// Record file manager.
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    path: PathBuf,
}

impl JsonRecordStore {
    /// Store at the default location (`<wincloud home>/instances.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(wincloud_home()?.join(RECORDS_FILE)))
    }

    /// Store with an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn load_sync(&self) -> Result<BTreeMap<String, ManagedInstance>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading records {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("parsing records {}", self.path.display()))
    }

    fn write_sync(&self, records: &BTreeMap<String, ManagedInstance>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(records).context("serializing records")?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
        }

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("finalizing records {}", self.path.display()))
    }

    /// Read-modify-write under one blocking task.
    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, ManagedInstance>) + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut records = store.load_sync()?;
            change(&mut records);
            store.write_sync(&records)
        })
        .await
        .context("record update task panicked")?
    }
}

impl InstanceRecordStore for JsonRecordStore {
    async fn load_all(&self) -> Result<BTreeMap<String, ManagedInstance>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load_sync())
            .await
            .context("record load task panicked")?
    }

    async fn save(&self, record: &ManagedInstance) -> Result<()> {
        let record = record.clone();
        self.update(move |records| {
            records.insert(record.name.clone(), record);
        })
        .await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.update(move |records| {
            records.remove(&name);
        })
        .await
    }
}
