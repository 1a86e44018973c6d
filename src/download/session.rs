// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! One `pldl <playlistId>` run from start to finish.
//!
//! Resume or list, lay out the output folder, write the manifest copy, then
//! hand the manifest to the [`DownloadLoop`].

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::manager::{DownloadLoop, DownloadOptions};
use super::state::{obtain_manifest, write_public_copy, ManifestStore, ObtainedManifest};
use super::types::{OutputLayout, RunSummary};
use crate::colors::symbols::INFO;
use crate::colors::{RESET, YELLOW};
use crate::extract::StreamResolver;
use crate::settings::{AppPaths, Settings};
use crate::spinner;
use crate::utils::count_noun;
use crate::youtube::PlaylistSource;

/// A configured download of one playlist.
pub struct PlaylistRun<'a> {
    playlist_id: String,
    store: ManifestStore,
    settings: &'a Settings,
    root: PathBuf,
    options: DownloadOptions,
    cancel: Arc<AtomicBool>,
}

impl<'a> PlaylistRun<'a> {
    /// Download `playlist_id` into `root` with the loop tuned from `settings`.
    pub fn new(paths: &AppPaths, settings: &'a Settings, playlist_id: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            playlist_id: playlist_id.to_string(),
            store: ManifestStore::for_playlist(paths, playlist_id),
            settings,
            root: root.into(),
            options: DownloadOptions::from_settings(settings),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    /// Flag that stops the run when set (Ctrl+C).
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Run to completion, interruption or the first fatal error.
    ///
    /// `connect` is only called when there is no manifest to resume, so a
    /// resumed run needs no API key.
    pub async fn execute<C>(&self, connect: C, resolver: &dyn StreamResolver) -> Result<RunSummary>
    where
        C: FnOnce() -> Result<Box<dyn PlaylistSource>>,
    {
        let ObtainedManifest { mut manifest, resumed } = match self.store.load()? {
            Some(manifest) => ObtainedManifest {
                manifest,
                resumed: true,
            },
            None => {
                let source = connect()?;
                let fetching = spinner::create("Fetching playlist...");
                match obtain_manifest(&self.store, source.as_ref(), &self.playlist_id, self.settings.max_results)
                    .await
                {
                    Ok(obtained) => {
                        spinner::finish_success(
                            &fetching,
                            &format!("{} ({})", obtained.manifest.title, count_noun(obtained.manifest.len(), "video")),
                        );
                        obtained
                    }
                    Err(e) => {
                        spinner::clear(&fetching);
                        return Err(e);
                    }
                }
            }
        };

        if resumed {
            tracing::info!("Resuming {} from {:?}", self.playlist_id, self.store.path());
            println!(
                "{YELLOW}{INFO}{RESET} Resuming {} ({} left)",
                manifest.title,
                count_noun(manifest.len(), "video")
            );
        }

        let name = manifest.file_stem(&self.playlist_id);
        let layout = OutputLayout::for_playlist(self.root.clone(), &name, self.settings.playlist_folder);
        std::fs::create_dir_all(layout.video_dir())
            .with_context(|| format!("Failed to create output folder {:?}", layout.video_dir()))?;

        let public_copy = layout.public_manifest_path(&name);
        if write_public_copy(&public_copy, &manifest)? {
            tracing::info!("Wrote manifest copy to {:?}", public_copy);
        }

        let runner = DownloadLoop::new(resolver, &self.store, self.options.clone(), self.cancel.clone());
        runner.run(&mut manifest, &layout).await
    }
}
