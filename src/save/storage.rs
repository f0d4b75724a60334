use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::core::Simulation;

use super::codec::{decode_payload, export_to_base64};

pub const SETTINGS_KEY: &str = "Settings";
pub const SAVE_SOURCE: &str = "save";
pub const LOAD_SOURCE: &str = "load";

pub trait Storage {
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;
    fn write(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> Result<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(f(&mut entries))
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        let value = self.with_entries(|entries| entries.get(key).cloned());
        async move { value }
    }

    fn write(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send {
        let written = self.with_entries(|entries| {
            entries.insert(key.to_string(), value);
        });
        async move { written }
    }
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.sav"))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        let path = self.path_for(key);
        async move {
            match fs::read_to_string(&path) {
                Ok(text) => Ok(Some(text)),
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
                Err(error) => Err(error)
                    .with_context(|| format!("failed reading save file: {}", path.display())),
            }
        }
    }

    fn write(&self, key: &str, value: String) -> impl Future<Output = Result<()>> + Send {
        let dir = self.dir.clone();
        let path = self.path_for(key);
        async move {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed creating save directory: {}", dir.display()))?;
            fs::write(&path, value)
                .with_context(|| format!("failed writing save file: {}", path.display()))
        }
    }
}

/// Runs a bookkeeping tick, then writes the encoded snapshot.
pub async fn persist<S: Storage>(sim: &mut Simulation, storage: &S, now: u64) -> Result<()> {
    sim.tick(now, SAVE_SOURCE, None, None);
    let payload = export_to_base64(&sim.save(now))?;
    storage.write(SETTINGS_KEY, payload).await?;
    info!(resources = sim.registry.len(), "state saved");
    Ok(())
}

/// Loads the stored snapshot, if any, then runs a bookkeeping tick.
/// Returns whether a snapshot was found.
pub async fn restore<S: Storage>(sim: &mut Simulation, storage: &S, now: u64) -> Result<bool> {
    let found = match storage.read(SETTINGS_KEY).await? {
        Some(payload) => {
            let patch = decode_payload(&payload)?;
            sim.load(&patch, now)?;
            true
        }
        None => false,
    };
    sim.tick(now, LOAD_SOURCE, None, None);
    info!(found, resources = sim.registry.len(), "state restored");
    Ok(found)
}
