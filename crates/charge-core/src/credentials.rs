//! Device id → vendor credential (`suid`) lookup, backed by a JSON file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock};

use crate::{
    domain::{Credential, DeviceId},
    Result,
};

type CredentialMap = IndexMap<DeviceId, Credential>;

pub struct CredentialStore {
    path: Option<PathBuf>,
    map: RwLock<CredentialMap>,
    // Held for the whole update + file write so writers never interleave.
    writer: Mutex<()>,
}

impl CredentialStore {
    /// In-memory store without a backing file.
    pub fn in_memory(entries: impl IntoIterator<Item = (DeviceId, Credential)>) -> Self {
        Self {
            path: None,
            map: RwLock::new(entries.into_iter().collect()),
            writer: Mutex::new(()),
        }
    }

    /// Load from `path`. Missing or invalid files start empty (with a warning) and are
    /// created on the first `set_credential`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = match read_map(&path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "credential file unavailable, starting empty");
                CredentialMap::new()
            }
        };
        tracing::info!(path = %path.display(), count = map.len(), "credentials loaded");

        Self {
            path: Some(path),
            map: RwLock::new(map),
            writer: Mutex::new(()),
        }
    }

    /// Credential for `id`, or the unresolved sentinel.
    pub async fn resolve(&self, id: &DeviceId) -> Credential {
        self.map
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_else(Credential::unresolved)
    }

    pub async fn is_resolved(&self, id: &DeviceId) -> bool {
        self.resolve(id).await.is_resolved()
    }

    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.read().await.is_empty()
    }

    /// Update one entry and rewrite the backing file.
    ///
    /// If the write fails the in-memory entry is restored to its previous value and
    /// the error is returned.
    pub async fn set_credential(&self, id: DeviceId, credential: Credential) -> Result<()> {
        let _writer = self.writer.lock().await;

        let (previous, snapshot) = {
            let mut map = self.map.write().await;
            let previous = map.insert(id.clone(), credential);
            (previous, map.clone())
        };

        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Err(e) = write_map(path, &snapshot).await {
            let mut map = self.map.write().await;
            match previous {
                Some(p) => {
                    map.insert(id, p);
                }
                None => {
                    map.shift_remove(&id);
                }
            }
            return Err(e);
        }

        tracing::info!(device_id = %id, path = %path.display(), "credential updated");
        Ok(())
    }
}

fn read_map(path: &Path) -> Result<CredentialMap> {
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(CredentialMap::new());
    }
    Ok(serde_json::from_str(&txt)?)
}

async fn write_map(path: &Path, map: &CredentialMap) -> Result<()> {
    let txt = serde_json::to_string_pretty(map)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, txt).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
