//! File-backed retry queue: one `<event_id>.json` per pending event.

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::{
    error::{FaultlineError, Result},
    event::Event,
};

const EXTENSION: &str = "json";

/// Default location of the pending-event directory
pub fn get_root_queue_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("faultline")
        .join("pending")
}

#[derive(Debug, Clone)]
pub struct PendingQueue {
    dir: PathBuf,
}

impl PendingQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `id`
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }

    /// Write the event under its id, replacing any previous file whole.
    pub async fn persist(&self, event: &Event) -> Result<PathBuf> {
        let path = self.path_for(event.id())?;
        let json = event.to_json()?;
        let tmp = self.tmp_path(event.id());
        let persistence = |source| FaultlineError::Persistence {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(persistence)?;
        fs::write(&tmp, json).await.map_err(persistence)?;
        if let Err(source) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(persistence(source));
        }

        tracing::debug!(event_id = %event.id(), path = %path.display(), "event queued");
        Ok(path)
    }

    /// Blocking variant of [`persist`](Self::persist) for contexts without a runtime, such as a panic hook.
    pub fn persist_blocking(&self, event: &Event) -> Result<PathBuf> {
        let path = self.path_for(event.id())?;
        let json = event.to_json()?;
        let tmp = self.tmp_path(event.id());
        let persistence = |source| FaultlineError::Persistence {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(persistence)?;
        std::fs::write(&tmp, json).map_err(persistence)?;
        if let Err(source) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(persistence(source));
        }
        Ok(path)
    }

    /// Ids of all queued events, sorted. A missing directory means an empty queue.
    pub async fn list_pending(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_id(id).is_ok() {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load a queued event. `Ok(None)` when it is gone, e.g. delivered by a concurrent pass.
    pub async fn load(&self, id: &str) -> Result<Option<Event>> {
        let path = self.path_for(id)?;
        match fs::read_to_string(&path).await {
            Ok(json) => Ok(Some(Event::from_json(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a queued event. Removing an id that is not queued is a no-op.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn tmp_path(&self, id: &str) -> PathBuf {
        self.dir
            .join(format!(".{id}.{}.tmp", Uuid::new_v4().simple()))
    }
}

fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FaultlineError::InvalidEventId(id.to_string()))
    }
}
