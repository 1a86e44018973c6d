// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Playlist download pipeline for pldl
//!
//! This module provides:
//! - The manifest that lists what is still to be downloaded
//! - Resumable runs that survive interruption
//! - The sequential download loop with its live progress line
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ DownloadLoop    │────▶│ StreamResolver  │
//! │ (one at a time) │     │ (yt-dlp + HTTP) │
//! └────────┬────────┘     └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ ManifestStore   │
//! │ (persistent)    │
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use pldl::download::PlaylistRun;
//! use pldl::extract::YtDlpResolver;
//! use pldl::settings::{AppPaths, Settings};
//! use pldl::youtube::{PlaylistSource, YoutubeClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let paths = AppPaths::discover()?;
//! let settings = Settings::load(&paths.settings_file())?;
//! let resolver = YtDlpResolver::new()?;
//!
//! let run = PlaylistRun::new(&paths, &settings, "PLxyz", std::env::current_dir()?);
//! let summary = run
//!     .execute(
//!         || Ok(Box::new(YoutubeClient::new("API_KEY")?) as Box<dyn PlaylistSource>),
//!         &resolver,
//!     )
//!     .await?;
//! println!("{} downloaded, {} left", summary.completed, summary.remaining);
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod progress;
pub mod session;
pub mod state;
pub mod types;

pub use manager::{DownloadLoop, DownloadOptions};
pub use progress::{format_bytes, format_time, progress_bar, render_line, ProgressLine, ProgressSnapshot};
pub use session::PlaylistRun;
pub use state::{obtain_manifest, write_public_copy, ManifestStore, ObtainedManifest};
pub use types::{EntryStatus, FailedEntry, OutputLayout, PlaylistManifest, RunSummary, VideoEntry};
