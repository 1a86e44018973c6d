// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! pldl - YouTube playlist downloader library
//!
//! List a playlist once, then download its videos one at a time. Progress
//! is checkpointed in a JSON manifest, so an interrupted run resumes where it
//! stopped.
//!
//! **Data API** -> **Manifest** -> **yt-dlp formats** -> **HTTP stream to disk**
//!
//! # Core Modules
//!
//! - [`youtube`] - Playlist title and member listing (YouTube Data API v3)
//! - [`download`] - Manifest storage and the sequential download loop
//! - [`extract`] - Rendition lookup through yt-dlp and stream selection
//! - [`settings`] - Persistent settings and application paths
//! - [`cli`] - Command-line parsing
//! - [`error`] - Consistent error formatting utilities

pub mod cli;
pub mod colors;
pub mod download;
pub mod error;
pub mod extract;
pub mod settings;
pub mod spinner;
pub mod utils;
pub mod youtube;

pub use download::{
    obtain_manifest, DownloadLoop, DownloadOptions, ManifestStore, OutputLayout, PlaylistManifest,
    PlaylistRun, RunSummary, VideoEntry,
};
pub use extract::{select_stream, StreamDescriptor, StreamResolver, YtDlpResolver};
pub use settings::{AppPaths, Settings};
pub use youtube::{list_playlist, PlaylistSource, YoutubeClient};
