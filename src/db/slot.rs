//! Key-value slots the store snapshot is persisted into.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Fixed key the whole store snapshot lives under.
pub const STORE_KEY: &str = "isponsor-store-v1";

pub trait StateSlot: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> anyhow::Result<Option<String>>;
    fn save(&self, blob: &str) -> anyhow::Result<()>;
}

/// `<dir>/isponsor-store-v1.json` on the local filesystem.
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", STORE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateSlot for FileSlot {
    fn load(&self) -> anyhow::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!("reading {}: {}", self.path.display(), e)),
        }
    }

    fn save(&self, blob: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves a half-written snapshot.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, blob.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Process-local slot; clones share the same backing map.
#[derive(Clone, Default)]
pub struct MemorySlot {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl StateSlot for MemorySlot {
    fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(STORE_KEY).cloned())
    }

    fn save(&self, blob: &str) -> anyhow::Result<()> {
        self.entries.lock().insert(STORE_KEY.to_string(), blob.to_string());
        Ok(())
    }
}
