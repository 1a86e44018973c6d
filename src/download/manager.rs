// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The download loop.
//!
//! Drains a [`PlaylistManifest`] one video at a time. Each finished video is
//! pruned from the manifest and the manifest is persisted before the next
//! one starts, so an interrupted run picks up where it stopped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::MissedTickBehavior;

use super::progress::{ProgressLine, ProgressSnapshot, ThroughputSampler, SAMPLE_INTERVAL};
use super::state::ManifestStore;
use super::types::{EntryStatus, FailedEntry, OutputLayout, PlaylistManifest, RunSummary, VideoEntry};
use crate::colors::symbols::{ERROR, WARNING};
use crate::colors::{GREEN, MAGENTA, RED, RESET, YELLOW};
use crate::extract::{select_stream, ExtractError, StreamResolver};
use crate::settings::Settings;
use crate::spinner;
use crate::utils::count_noun;

/// Pause between two videos.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(8);

/// Attempts per video before it is skipped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay between attempts of the same video.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How long a media host may go without sending data before the attempt fails.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Granularity of cancellation checks while sleeping.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Tuning for one run of the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    pub cooldown: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Limit on waiting for response headers or the next chunk
    pub stall_timeout: Duration,
    /// `progStyle` setting (1..=8)
    pub progress_style: u8,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            progress_style: 1,
        }
    }
}

impl DownloadOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            progress_style: settings.progress_style,
            ..Self::default()
        }
    }
}

/// How one video ended.
#[derive(Debug)]
enum Outcome {
    Completed(PathBuf),
    Interrupted,
    Failed(FailedEntry),
}

/// Sequential playlist downloader.
pub struct DownloadLoop<'a> {
    resolver: &'a dyn StreamResolver,
    store: &'a ManifestStore,
    options: DownloadOptions,
    cancel: Arc<AtomicBool>,
}

impl<'a> DownloadLoop<'a> {
    pub fn new(
        resolver: &'a dyn StreamResolver,
        store: &'a ManifestStore,
        options: DownloadOptions,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            resolver,
            store,
            options,
            cancel,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn transition(&self, entry: &VideoEntry, status: EntryStatus) {
        tracing::debug!("{}: {:?}", entry.video_id, status);
    }

    /// Save `manifest` off the async workers; the store polls its lock with blocking sleeps.
    async fn persist(&self, manifest: &PlaylistManifest) -> Result<()> {
        let store = self.store.clone();
        let snapshot = manifest.clone();
        tokio::task::spawn_blocking(move || store.save(&snapshot))
            .await
            .context("Manifest save task failed")?
    }

    /// Delete the finished manifest off the async workers.
    async fn discard(&self) -> Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.delete())
            .await
            .context("Manifest delete task failed")?
    }

    /// Sleep for `duration`. Returns false if the run was cancelled meanwhile.
    async fn pause(&self, duration: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep((deadline - now).min(CANCEL_POLL)).await;
        }
    }

    /// Download every entry of `manifest` into `layout`.
    ///
    /// Entries that keep failing are skipped and stay in the manifest. The
    /// manifest on disk always matches `manifest` when this returns `Ok`;
    /// once it is empty the file is deleted.
    pub async fn run(&self, manifest: &mut PlaylistManifest, layout: &OutputLayout) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        if manifest.is_empty() {
            self.discard().await?;
            println!("    All videos have been downloaded!");
            return Ok(summary);
        }

        let queue = manifest.entries.clone();
        let mut index = 0;

        while index < queue.len() {
            let entry = &queue[index];
            index += 1;

            if self.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            match self.download_entry(entry, layout).await {
                Outcome::Completed(path) => {
                    self.transition(entry, EntryStatus::Completed);
                    manifest.remove(&entry.video_id);
                    summary.completed += 1;

                    println!("{} Download completed!", layout.display_path(&path).display());
                    tracing::info!("Saved {:?}", path);

                    if manifest.is_empty() {
                        self.discard().await?;
                        println!("    All videos have been downloaded!");
                        break;
                    }

                    self.persist(manifest).await?;
                    println!("{MAGENTA}{}{RESET} remaining", count_noun(manifest.len(), "video"));

                    if index < queue.len() && !self.pause(self.options.cooldown).await {
                        summary.interrupted = true;
                        break;
                    }
                }
                Outcome::Interrupted => {
                    summary.interrupted = true;
                    break;
                }
                Outcome::Failed(failed) => {
                    self.transition(
                        entry,
                        EntryStatus::Failed {
                            error: failed.error.clone(),
                            attempts: failed.attempts,
                        },
                    );
                    summary.failed.push(failed);
                }
            }
        }

        if summary.interrupted {
            self.persist(manifest).await?;
            tracing::info!("Interrupted with {} videos left", manifest.len());
        }

        summary.remaining = manifest.len();
        Ok(summary)
    }

    /// All attempts for one entry.
    async fn download_entry(&self, entry: &VideoEntry, layout: &OutputLayout) -> Outcome {
        println!("   Downloading {GREEN}{} ...{RESET}", entry.title);

        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.download_once(entry, layout, attempt).await {
                Ok(Some(path)) => return Outcome::Completed(path),
                Ok(None) => return Outcome::Interrupted,
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {:#}",
                        attempt,
                        max_attempts,
                        entry.video_id,
                        e
                    );

                    if attempt >= max_attempts {
                        println!(
                            "   {RED}{ERROR}{RESET} Skipping {} after {} attempts: {}",
                            entry.title, attempt, e
                        );
                        return Outcome::Failed(FailedEntry {
                            video_id: entry.video_id.clone(),
                            title: entry.title.clone(),
                            error: format!("{:#}", e),
                            attempts: attempt,
                        });
                    }

                    println!(
                        "   {YELLOW}{WARNING}{RESET} Attempt {}/{} failed: {}. Retrying in {}s...",
                        attempt,
                        max_attempts,
                        e,
                        self.options.retry_delay.as_secs()
                    );
                    if !self.pause(self.options.retry_delay).await {
                        return Outcome::Interrupted;
                    }
                }
            }
        }
    }

    /// One attempt. `Ok(None)` means the run was cancelled.
    async fn download_once(
        &self,
        entry: &VideoEntry,
        layout: &OutputLayout,
        attempt: u32,
    ) -> Result<Option<PathBuf>> {
        if self.is_cancelled() {
            return Ok(None);
        }

        self.transition(entry, EntryStatus::ResolvingStream { attempt });
        let lookup = spinner::create("Looking up streams...");
        let streams = self.resolver.resolve(&entry.link).await;
        spinner::clear(&lookup);
        let streams = streams?;
        let stream = select_stream(&streams)
            .ok_or_else(|| anyhow!(ExtractError::NoPlayableStream(entry.link.clone())))?
            .clone();
        tracing::debug!(
            "Selected format {} ({}) for {}",
            stream.format_id,
            stream.quality_label.as_deref().unwrap_or("unknown quality"),
            entry.video_id
        );

        let dest = layout.video_path(&entry.title, &stream.ext);
        let opened = match tokio::time::timeout(self.options.stall_timeout, self.resolver.open(&stream)).await {
            Ok(opened) => opened?,
            Err(_) => bail!("No response from the media host within {:?}", self.options.stall_timeout),
        };
        let total = opened.content_length.or(stream.content_length);
        self.transition(
            entry,
            EntryStatus::Streaming {
                bytes_downloaded: 0,
                bytes_total: total,
            },
        );

        match self.copy_stream(opened.body, &dest, total).await {
            Ok(true) => Ok(Some(dest)),
            Ok(false) => {
                remove_partial(&dest);
                Ok(None)
            }
            Err(e) => {
                remove_partial(&dest);
                Err(e)
            }
        }
    }

    /// Copy `body` into `dest`, redrawing the progress line as bytes arrive.
    ///
    /// Returns false if cancelled before the stream ended.
    async fn copy_stream(
        &self,
        body: BoxStream<'static, Result<Bytes>>,
        dest: &Path,
        total: Option<u64>,
    ) -> Result<bool> {
        let file = File::create(dest)
            .await
            .with_context(|| format!("Failed to create {:?}", dest))?;
        let mut writer = BufWriter::new(file);
        let mut line = ProgressLine::stdout(self.options.progress_style);

        let result = self.pump(body, &mut writer, &mut line, total).await;

        if let Err(e) = line.finish() {
            tracing::debug!("Could not finish progress line: {}", e);
        }

        if result? {
            writer
                .flush()
                .await
                .with_context(|| format!("Failed to flush {:?}", dest))?;
            writer
                .into_inner()
                .sync_all()
                .await
                .with_context(|| format!("Failed to sync {:?}", dest))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn pump<W: std::io::Write>(
        &self,
        mut body: BoxStream<'static, Result<Bytes>>,
        writer: &mut BufWriter<File>,
        line: &mut ProgressLine<W>,
        total: Option<u64>,
    ) -> Result<bool> {
        let mut sampler = ThroughputSampler::new(Instant::now());
        let mut received: u64 = 0;

        let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        let stall = tokio::time::sleep(self.options.stall_timeout);
        tokio::pin!(stall);

        loop {
            tokio::select! {
                chunk = body.next() => {
                    let chunk = match chunk {
                        Some(chunk) => chunk?,
                        None => break,
                    };
                    writer.write_all(&chunk).await.context("Failed to write video data")?;
                    received += chunk.len() as u64;

                    if self.is_cancelled() {
                        return Ok(false);
                    }
                    stall.as_mut().reset(tokio::time::Instant::now() + self.options.stall_timeout);
                    draw(line, received, total, sampler.rate());
                }
                _ = ticker.tick() => {
                    if self.is_cancelled() {
                        return Ok(false);
                    }
                    let rate = sampler.sample(received, Instant::now());
                    draw(line, received, total, rate);
                }
                _ = &mut stall => {
                    bail!("No data received for {:?}", self.options.stall_timeout);
                }
            }
        }

        if let Some(total) = total {
            if received < total {
                bail!("Stream ended after {} of {} bytes", received, total);
            }
        }

        draw(line, received, total.or(Some(received)), sampler.rate());
        Ok(true)
    }
}

fn draw<W: std::io::Write>(line: &mut ProgressLine<W>, received: u64, total: Option<u64>, rate: f64) {
    let snapshot = ProgressSnapshot { received, total, rate };
    if let Err(e) = line.draw(&snapshot) {
        tracing::debug!("Could not draw progress line: {}", e);
    }
}

/// Delete a half-written file; a missing file is fine.
fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed partial file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove partial file {:?}: {}", path, e),
    }
}
