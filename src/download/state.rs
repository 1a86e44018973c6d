// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persistent manifest storage.
//!
//! The keyed manifest (`<home>/Playlist/<playlistId>.json`) is the checkpoint
//! that makes runs resumable: it is rewritten after every finished video and
//! deleted once the playlist is done.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use fs2::FileExt;

use super::types::PlaylistManifest;
use crate::settings::AppPaths;
use crate::youtube::{list_playlist, PlaylistSource};

/// Default timeout for acquiring file locks (5 seconds)
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry interval when waiting for lock acquisition
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Manifest file for one playlist, guarded by a sibling `.lock` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    /// Store keyed by playlist id under the application home.
    pub fn for_playlist(paths: &AppPaths, playlist_id: &str) -> Self {
        Self::at(paths.manifest_file(playlist_id))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file coordinating access to the manifest.
    ///
    /// A separate file lets the lock stay held across the atomic rename.
    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Acquire an exclusive lock with timeout.
    ///
    /// Returns the locked file handle on success, or an error if the timeout expires.
    fn acquire_exclusive_lock_with_timeout(path: &Path, timeout: Duration) -> Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for lock file: {:?}", parent))?;
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {:?}", path))?;

        let start = Instant::now();

        loop {
            match lock_file.try_lock_exclusive() {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        bail!(
                            "Timed out waiting for exclusive lock on {:?} after {:?}. \
                             Another pldl run may be using this playlist.",
                            path,
                            timeout
                        );
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to acquire exclusive lock on {:?}", path));
                }
            }
        }
    }

    /// Acquire a shared lock with timeout.
    fn acquire_shared_lock_with_timeout(file: &File, timeout: Duration) -> Result<()> {
        let start = Instant::now();

        loop {
            match FileExt::try_lock_shared(file) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        bail!(
                            "Timed out waiting for shared lock after {:?}. \
                             Another pldl run may be writing this manifest.",
                            timeout
                        );
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(e).context("Failed to acquire shared lock on manifest");
                }
            }
        }
    }

    /// Load the manifest, or `None` if there is no file.
    ///
    /// A file that exists but does not parse is an error; it is never
    /// silently replaced.
    pub fn load(&self) -> Result<Option<PlaylistManifest>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let lock_path = self.lock_path();
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        Self::acquire_shared_lock_with_timeout(&lock_file, LOCK_TIMEOUT)?;

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read manifest: {:?}", self.path))?;
        let manifest: PlaylistManifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {:?}", self.path))?;

        Ok(Some(manifest))
    }

    /// Save the manifest with a temp file + atomic rename under an exclusive lock.
    pub fn save(&self, manifest: &PlaylistManifest) -> Result<()> {
        self.save_with_timeout(manifest, LOCK_TIMEOUT)
    }

    pub fn save_with_timeout(&self, manifest: &PlaylistManifest, timeout: Duration) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let _lock_guard = Self::acquire_exclusive_lock_with_timeout(&self.lock_path(), timeout)?;

        let temp_path = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(manifest)
            .context("Failed to serialize manifest to JSON")?;

        {
            let mut temp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;

            temp_file
                .write_all(content.as_bytes())
                .context("Failed to write to temp file")?;

            // Data must be on disk before the rename makes it visible
            temp_file
                .sync_all()
                .context("Failed to sync temp file to disk")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename temp file to manifest: {:?} -> {:?}",
                temp_path, self.path
            )
        })?;

        tracing::debug!("Saved manifest with {} entries to {:?}", manifest.len(), self.path);
        Ok(())
    }

    /// Remove the manifest and its lock file.
    pub fn delete(&self) -> Result<()> {
        {
            let _lock_guard = Self::acquire_exclusive_lock_with_timeout(&self.lock_path(), LOCK_TIMEOUT)?;
            if self.path.exists() {
                fs::remove_file(&self.path)
                    .with_context(|| format!("Failed to delete manifest: {:?}", self.path))?;
            }
        }

        if let Err(e) = fs::remove_file(self.lock_path()) {
            tracing::debug!("Could not remove lock file {:?}: {}", self.lock_path(), e);
        }
        Ok(())
    }
}

/// Write the human-named manifest copy unless one already exists.
///
/// Returns whether a file was written.
pub fn write_public_copy(path: &Path, manifest: &PlaylistManifest) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let content = serde_json::to_string_pretty(manifest)
        .context("Failed to serialize manifest to JSON")?;
    fs::write(path, content).with_context(|| format!("Failed to write manifest copy: {:?}", path))?;
    Ok(true)
}

/// A manifest ready for the download loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObtainedManifest {
    pub manifest: PlaylistManifest,
    /// Loaded from a previous run instead of listed from the API
    pub resumed: bool,
}

/// Create-or-resume.
///
/// An existing keyed manifest is returned unchanged without touching the
/// API. Otherwise the title and every member are listed and the new
/// manifest is saved before it is returned.
pub async fn obtain_manifest(
    store: &ManifestStore,
    source: &dyn PlaylistSource,
    playlist_id: &str,
    max_results: Option<u32>,
) -> Result<ObtainedManifest> {
    if let Some(manifest) = store.load()? {
        tracing::info!(
            "Resuming playlist {} from {:?} ({} videos left)",
            playlist_id,
            store.path(),
            manifest.len()
        );
        return Ok(ObtainedManifest {
            manifest,
            resumed: true,
        });
    }

    let title = source.playlist_title(playlist_id).await?;
    let entries = list_playlist(source, playlist_id, max_results).await?;
    tracing::info!("Listed {} videos in playlist {:?}", entries.len(), title);

    let manifest = PlaylistManifest::new(title, entries);
    store.save(&manifest)?;

    Ok(ObtainedManifest {
        manifest,
        resumed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::types::VideoEntry;
    use crate::youtube::PlaylistPage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn entry(id: &str) -> VideoEntry {
        VideoEntry {
            video_id: id.to_string(),
            title: format!("Title {}", id),
            description: format!("About {}", id),
            thumbnail: format!("https://i.ytimg.com/vi/{}/default.jpg", id),
            link: format!("https://www.youtube.com/watch?v={}", id),
        }
    }

    #[derive(Default)]
    struct CountingSource {
        title_calls: AtomicUsize,
        page_calls: AtomicUsize,
    }

    #[async_trait]
    impl PlaylistSource for CountingSource {
        async fn playlist_title(&self, _playlist_id: &str) -> Result<String> {
            self.title_calls.fetch_add(1, Ordering::SeqCst);
            Ok("Listed".to_string())
        }

        async fn playlist_page(
            &self,
            _playlist_id: &str,
            _page_size: u32,
            _page_token: Option<&str>,
        ) -> Result<PlaylistPage> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PlaylistPage {
                entries: vec![entry("x"), entry("y")],
                next_page_token: None,
            })
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = ManifestStore::at(dir.path().join("Playlist").join("PL1.json"));
        assert!(store.load().unwrap().is_none());

        let manifest = PlaylistManifest::new("Mix", vec![entry("a"), entry("b")]);
        store.save(&manifest).unwrap();

        assert!(store.exists());
        assert_eq!(store.load().unwrap(), Some(manifest));
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_reads_historical_manifest() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("PL1.json");
        fs::write(
            &path,
            r#"{
    "Title": "Old run",
    "Playlist": [
        {
            "videoId": "a1",
            "title": "First",
            "description": "d",
            "thumbnail": "https://i.ytimg.com/vi/a1/default.jpg",
            "link": "https://www.youtube.com/watch?v=a1"
        }
    ]
}"#,
        )
        .unwrap();

        let manifest = ManifestStore::at(&path).load().unwrap().unwrap();
        assert_eq!(manifest.title, "Old run");
        assert_eq!(manifest.entries[0].video_id, "a1");
    }

    #[test]
    fn test_corrupt_manifest_is_an_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("PL1.json");
        fs::write(&path, "{\"Title\": ").unwrap();

        let err = ManifestStore::at(&path).load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse manifest"));
        assert!(path.exists(), "corrupt manifest must be left in place");
    }

    #[test]
    fn test_delete_removes_manifest_and_lock() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = ManifestStore::at(dir.path().join("PL1.json"));
        store.save(&PlaylistManifest::new("Mix", vec![])).unwrap();
        assert!(store.lock_path().exists());

        store.delete().unwrap();
        assert!(!store.exists());
        assert!(!store.lock_path().exists());
    }

    #[test]
    fn test_save_times_out_while_locked() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = ManifestStore::at(dir.path().join("PL1.json"));

        let _held = ManifestStore::acquire_exclusive_lock_with_timeout(
            &store.lock_path(),
            Duration::from_secs(1),
        )
        .expect("First lock should succeed");

        let result = store.save_with_timeout(
            &PlaylistManifest::new("Mix", vec![]),
            Duration::from_millis(100),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Timed out"), "{}", err);
        assert!(!store.exists());
    }

    #[test]
    fn test_exclusive_lock_blocks_shared() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let lock_path = dir.path().join("PL1.lock");

        let _exclusive =
            ManifestStore::acquire_exclusive_lock_with_timeout(&lock_path, Duration::from_secs(1))
                .expect("Exclusive lock should succeed");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .expect("Failed to open lock file");

        let result = ManifestStore::acquire_shared_lock_with_timeout(&file, Duration::from_millis(100));
        assert!(result.is_err(), "Shared lock should fail while exclusive is held");
    }

    #[test]
    fn test_public_copy_written_once() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("Mix").join("Mix.json");

        let first = PlaylistManifest::new("Mix", vec![entry("a")]);
        assert!(write_public_copy(&path, &first).unwrap());

        let second = PlaylistManifest::new("Mix", vec![]);
        assert!(!write_public_copy(&path, &second).unwrap());

        let on_disk: PlaylistManifest =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, first);
    }

    #[tokio::test]
    async fn test_obtain_manifest_lists_and_saves() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = ManifestStore::at(dir.path().join("PL1.json"));
        let source = CountingSource::default();

        let obtained = obtain_manifest(&store, &source, "PL1", None).await.unwrap();
        assert!(!obtained.resumed);
        assert_eq!(obtained.manifest.title, "Listed");
        assert_eq!(obtained.manifest.len(), 2);
        assert_eq!(store.load().unwrap(), Some(obtained.manifest));
        assert_eq!(source.title_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_obtain_manifest_resumes_without_api_calls() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = ManifestStore::at(dir.path().join("PL1.json"));
        let pending = PlaylistManifest::new("Earlier run", vec![entry("b"), entry("c")]);
        store.save(&pending).unwrap();

        let source = CountingSource::default();
        let obtained = obtain_manifest(&store, &source, "PL1", Some(1)).await.unwrap();

        assert!(obtained.resumed);
        assert_eq!(obtained.manifest, pending);
        assert_eq!(source.title_calls.load(Ordering::SeqCst), 0);
        assert_eq!(source.page_calls.load(Ordering::SeqCst), 0);
    }
}
