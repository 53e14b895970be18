//! Session Store - durable login marker
//!
//! Holds the `{loggedIn, role}` marker (plus an optional principal snapshot)
//! so a session survives process restarts. Only `login` and `logout` write
//! to it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::fs;

use crate::identity::Principal;

/// Persisted session marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMarker {
    pub logged_in: bool,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
}

impl SessionMarker {
    pub fn for_principal(principal: &Principal) -> Self {
        Self {
            logged_in: true,
            role: principal.role.to_string(),
            principal: Some(principal.clone()),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `Ok(None)` when nothing is stored; `Err` when the stored data is unreadable
    async fn load(&self) -> Result<Option<SessionMarker>>;

    async fn save(&self, marker: &SessionMarker) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// JSON file on local disk
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionMarker>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .await
            .context("Failed to read session file")?;

        let marker = serde_json::from_str(&json).context("Failed to deserialize session marker")?;

        Ok(Some(marker))
    }

    async fn save(&self, marker: &SessionMarker) -> Result<()> {
        let json = serde_json::to_string_pretty(marker).context("Failed to serialize session marker")?;

        fs::write(&self.path, json)
            .await
            .context("Failed to write session file")?;

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if fs::try_exists(&self.path).await.unwrap_or(false) {
            fs::remove_file(&self.path)
                .await
                .context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// In-process store. Keeps the raw JSON so callers can seed malformed data,
/// and counts writes.
#[derive(Default)]
pub struct MemorySessionStore {
    raw: Mutex<Option<String>>,
    saves: AtomicUsize,
    clears: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(json: impl Into<String>) -> Self {
        Self { raw: Mutex::new(Some(json.into())), ..Self::default() }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().map(|r| r.clone()).unwrap_or(None)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionMarker>> {
        let raw = self
            .raw
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))?
            .clone();
        match raw {
            None => Ok(None),
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Failed to deserialize session marker")?,
            )),
        }
    }

    async fn save(&self, marker: &SessionMarker) -> Result<()> {
        let json = serde_json::to_string(marker)?;
        let mut raw = self
            .raw
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))?;
        *raw = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut raw = self
            .raw
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))?;
        *raw = None;
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
