//! Profile persisted by the pre-auth demo build
//!
//! Older installs kept a single profile in local storage. The gateway-backed
//! profile replaced it; the file is only read to seed a display name.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl LegacyProfile {
    /// Non-blank name, trimmed.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct LegacyProfileCache {
    path: PathBuf,
}

impl LegacyProfileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable file counts as no profile.
    pub async fn load(&self) -> Option<LegacyProfile> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("could not read legacy profile {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("ignoring malformed legacy profile {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub async fn save(&self, profile: &LegacyProfile) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(profile)?;
        tokio::fs::write(&self.path, json).await
    }

    pub async fn clear(&self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_load_clear() {
        let dir = tempdir().unwrap();
        let cache = LegacyProfileCache::new(dir.path().join("profile.json"));
        assert!(cache.load().await.is_none());

        let profile = LegacyProfile {
            name: Some("  Demo Dana ".to_string()),
            ..LegacyProfile::default()
        };
        cache.save(&profile).await.unwrap();
        let loaded = cache.load().await.unwrap();
        assert_eq!(loaded.display_name(), Some("Demo Dana"));

        cache.clear().await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn malformed_file_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(LegacyProfileCache::new(path).load().await.is_none());
    }
}
