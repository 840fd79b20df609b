//! Song store seam and the directory-backed implementation.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::errors::StoreError;
use crate::names::{contained_path, has_chart_extension, is_valid_song_name};

/// Persistent chart storage.
///
/// Names are validated by every implementation before any I/O.
#[async_trait]
pub trait SongStore: Send + Sync {
    /// Names of all stored charts (`.pro` / `.cho`), sorted.
    async fn list_songs(&self) -> Result<Vec<String>, StoreError>;

    /// Create or overwrite a chart. `None` content writes an empty file.
    async fn save(&self, name: &str, content: Option<&str>) -> Result<(), StoreError>;

    /// Read a chart's text.
    async fn read(&self, name: &str) -> Result<String, StoreError>;
}

/// [`SongStore`] over a single flat directory.
#[derive(Debug, Clone)]
pub struct DirSongStore {
    root: PathBuf,
}

impl DirSongStore {
    /// Create a store rooted at `root`, made absolute against the current
    /// working directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = std::path::absolute(root.as_ref())?;
        Ok(Self { root })
    }

    /// The absolute storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_song_name(name) {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
            });
        }
        contained_path(&self.root, name).ok_or_else(|| StoreError::PathEscape {
            path: self.root.join(name).display().to_string(),
        })
    }
}

#[async_trait]
impl SongStore for DirSongStore {
    async fn list_songs(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if has_chart_extension(&name) && entry.file_type().await?.is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn save(&self, name: &str, content: Option<&str>) -> Result<(), StoreError> {
        let path = self.resolve(name)?;
        let body = content.unwrap_or_default();
        tokio::fs::write(&path, body).await?;
        debug!(song = name, bytes = body.len(), "song saved");
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<String, StoreError> {
        let path = self.resolve(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn store() -> (tempfile::TempDir, DirSongStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirSongStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn save_then_read() {
        let (_dir, store) = store();
        store.save("a.pro", Some("{title: A}")).await.unwrap();
        assert_eq!(store.read("a.pro").await.unwrap(), "{title: A}");
    }

    #[tokio::test]
    async fn save_overwrites() {
        let (_dir, store) = store();
        store.save("a.pro", Some("one")).await.unwrap();
        store.save("a.pro", Some("two")).await.unwrap();
        assert_eq!(store.read("a.pro").await.unwrap(), "two");
    }

    #[tokio::test]
    async fn save_without_content_writes_empty_file() {
        let (dir, store) = store();
        store.save("empty.cho", None).await.unwrap();
        let on_disk = std::fs::read_to_string(dir.path().join("empty.cho")).unwrap();
        assert!(on_disk.is_empty());
    }

    #[tokio::test]
    async fn save_preserves_unicode() {
        let (_dir, store) = store();
        let text = "{title: Été}\n[Am]Là-bas ♪";
        store.save("ete.pro", Some(text)).await.unwrap();
        assert_eq!(store.read("ete.pro").await.unwrap(), text);
    }

    #[tokio::test]
    async fn save_rejects_bad_name_without_writing() {
        let (dir, store) = store();
        let err = store.save("x.txt", Some("data")).await.unwrap_err();
        assert_matches!(err, StoreError::InvalidName { .. });
        assert!(!dir.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn save_rejects_traversal() {
        let (_dir, store) = store();
        let err = store.save("../evil.pro", Some("x")).await.unwrap_err();
        assert_matches!(err, StoreError::InvalidName { .. });
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.read("missing.pro").await.unwrap_err();
        assert_matches!(err, StoreError::NotFound { name } if name == "missing.pro");
    }

    #[tokio::test]
    async fn read_rejects_bad_name() {
        let (_dir, store) = store();
        let err = store.read("notes.txt").await.unwrap_err();
        assert_matches!(err, StoreError::InvalidName { .. });
    }

    #[tokio::test]
    async fn list_filters_and_sorts() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("b.pro"), "").unwrap();
        std::fs::write(dir.path().join("a.CHO"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();
        std::fs::write(dir.path().join("c.cho"), "").unwrap();

        let names = store.list_songs().await.unwrap();
        assert_eq!(names, vec!["a.CHO", "b.pro", "c.cho"]);
    }

    #[tokio::test]
    async fn list_skips_directories() {
        let (dir, store) = store();
        std::fs::create_dir(dir.path().join("archive.pro")).unwrap();
        std::fs::write(dir.path().join("real.pro"), "").unwrap();
        assert_eq!(store.list_songs().await.unwrap(), vec!["real.pro"]);
    }

    #[tokio::test]
    async fn list_empty_dir() {
        let (_dir, store) = store();
        assert!(store.list_songs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirSongStore::new(dir.path().join("gone")).unwrap();
        let err = store.list_songs().await.unwrap_err();
        assert_matches!(err, StoreError::Io(_));
    }

    #[tokio::test]
    async fn saved_song_appears_in_list() {
        let (_dir, store) = store();
        store.save("new.pro", Some("x")).await.unwrap();
        assert!(store.list_songs().await.unwrap().contains(&"new.pro".to_string()));
    }

    #[test]
    fn root_is_absolute() {
        let store = DirSongStore::new("relative/charts").unwrap();
        assert!(store.root().is_absolute());
    }
}
