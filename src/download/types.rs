// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download types for playlist downloading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::sanitize_filename;

/// A playlist member waiting to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    pub video_id: String,
    /// Sanitized title, used as the file name
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Default thumbnail URL (may be empty)
    #[serde(default)]
    pub thumbnail: String,
    /// Watch page link handed to the stream resolver
    pub link: String,
}

/// Durable work queue for one playlist.
///
/// Serialized as `{"Title": ..., "Playlist": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistManifest {
    #[serde(rename = "Title")]
    pub title: String,
    /// Videos not yet downloaded, in playlist order
    #[serde(rename = "Playlist", default)]
    pub entries: Vec<VideoEntry>,
}

impl PlaylistManifest {
    pub fn new(title: impl Into<String>, entries: Vec<VideoEntry>) -> Self {
        Self {
            title: title.into(),
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Name for the playlist folder and the manifest copy.
    ///
    /// Falls back to the playlist id when the sanitized title is blank or
    /// only dots, which would otherwise resolve to the output root or above it.
    pub fn file_stem(&self, playlist_id: &str) -> String {
        let name = sanitize_filename(&self.title);
        if is_usable_name(&name) {
            return name;
        }
        let id = sanitize_filename(playlist_id);
        if is_usable_name(&id) {
            id
        } else {
            "playlist".to_string()
        }
    }

    /// Remove the entry for `video_id`. Returns it if it was present.
    pub fn remove(&mut self, video_id: &str) -> Option<VideoEntry> {
        let index = self.entries.iter().position(|e| e.video_id == video_id)?;
        Some(self.entries.remove(index))
    }
}

fn is_usable_name(name: &str) -> bool {
    !name.trim().trim_matches('.').is_empty()
}

/// Where downloaded files and the public manifest copy go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    folder: Option<String>,
}

impl OutputLayout {
    /// Files go straight into `root`.
    pub fn flat(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            folder: None,
        }
    }

    /// Files go into `root/<sanitized playlist title>/`.
    pub fn playlist_folder(root: impl Into<PathBuf>, playlist_title: &str) -> Self {
        Self {
            root: root.into(),
            folder: Some(sanitize_filename(playlist_title)),
        }
    }

    /// Pick the layout for a playlist from the `plFolder` setting.
    pub fn for_playlist(root: impl Into<PathBuf>, playlist_title: &str, use_folder: bool) -> Self {
        if use_folder {
            Self::playlist_folder(root, playlist_title)
        } else {
            Self::flat(root)
        }
    }

    /// Directory that receives the media files.
    pub fn video_dir(&self) -> PathBuf {
        match &self.folder {
            Some(folder) => self.root.join(folder),
            None => self.root.clone(),
        }
    }

    /// Destination for one video. `title` is expected to be sanitized already.
    pub fn video_path(&self, title: &str, ext: &str) -> PathBuf {
        let ext = if ext.is_empty() { "mp4" } else { ext };
        self.video_dir().join(format!("{}.{}", title, ext))
    }

    /// Human-named manifest copy.
    pub fn public_manifest_path(&self, playlist_title: &str) -> PathBuf {
        self.video_dir()
            .join(format!("{}.json", sanitize_filename(playlist_title)))
    }

    /// Path of `path` relative to the output root, for messages.
    pub fn display_path<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

/// Lifecycle of one manifest entry during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryStatus {
    /// Not attempted yet
    Pending,
    /// Asking the resolver for renditions
    ResolvingStream { attempt: u32 },
    /// Copying bytes
    Streaming {
        bytes_downloaded: u64,
        bytes_total: Option<u64>,
    },
    /// Saved to disk and removed from the manifest
    Completed,
    /// Gave up after the last attempt; left in the manifest
    Failed { error: String, attempts: u32 },
}

/// An entry that could not be downloaded this run.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedEntry {
    pub video_id: String,
    pub title: String,
    pub error: String,
    pub attempts: u32,
}

/// Outcome of one pass over a manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Videos downloaded and pruned from the manifest
    pub completed: usize,
    /// Videos skipped after exhausting their attempts
    pub failed: Vec<FailedEntry>,
    /// Entries still in the manifest when the run ended
    pub remaining: usize,
    /// The user interrupted the run
    pub interrupted: bool,
}

impl RunSummary {
    /// Every video in the playlist is on disk.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0 && !self.interrupted
    }
}
