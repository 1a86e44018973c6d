// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stream extraction for pldl.
//!
//! Turning a watch link into downloadable media URLs is delegated to the
//! external `yt-dlp` program. pldl only asks it for the format list
//! (`--dump-single-json`), picks one rendition with [`select_stream`], and
//! streams that rendition's bytes itself.
//!
//! The [`StreamResolver`] trait is the seam the download loop depends on.

pub mod select;

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::ErrorBuilder;

pub use select::{best_muxed, best_video_only_mp4, select_stream};

/// Environment variable overriding the yt-dlp program path.
pub const YTDLP_ENV: &str = "PLDL_YTDLP";

/// Program name looked up on `PATH` when no override is set.
const DEFAULT_YTDLP: &str = "yt-dlp";

/// Connect timeout for media hosts (in seconds). No overall timeout: media streams are long.
const CONNECT_TIMEOUT_SECS: u64 = 15;

static QUALITY_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{2,4})p").expect("quality label regex is valid"));

/// Error types specific to stream extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The yt-dlp program could not be started.
    ToolMissing(String),
    /// yt-dlp ran but reported a failure.
    ToolFailed { link: String, detail: String },
    /// No rendition pldl can download in one piece.
    NoPlayableStream(String),
    /// The media host refused the stream request.
    Http { status: u16 },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolMissing(program) => write!(f, "Could not run {}", program),
            Self::ToolFailed { link, detail } => write!(f, "yt-dlp failed for {}: {}", link, detail),
            Self::NoPlayableStream(link) => write!(f, "No downloadable stream found for {}", link),
            Self::Http { status } => write!(f, "Media host answered HTTP {}", status),
        }
    }
}

impl std::error::Error for ExtractError {}

impl ExtractError {
    /// Causes and fixes to show the user for this error.
    pub fn guidance(&self) -> ErrorBuilder {
        match self {
            Self::ToolMissing(_) => ErrorBuilder::new(self.to_string())
                .cause("yt-dlp is not installed or not on PATH")
                .fix("Install it: https://github.com/yt-dlp/yt-dlp#installation")
                .fix(format!("Or point {} at the executable", YTDLP_ENV)),
            Self::ToolFailed { .. } => ErrorBuilder::new(self.to_string())
                .cause("The video is private, age-restricted or region-locked")
                .cause("yt-dlp is out of date")
                .fix("Update it: yt-dlp -U"),
            Self::NoPlayableStream(_) => ErrorBuilder::new(self.to_string())
                .cause("Only segmented (HLS/DASH) renditions are offered for this video"),
            Self::Http { .. } => ErrorBuilder::new(self.to_string())
                .cause("The stream URL expired or was rate limited")
                .fix("Run the same command again to resume"),
        }
    }
}

/// One downloadable rendition of a video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDescriptor {
    pub format_id: String,
    /// Direct media URL
    pub url: String,
    /// Container extension, e.g. "mp4"
    pub ext: String,
    /// Human quality label such as "720p60"
    pub quality_label: Option<String>,
    /// Vertical resolution in pixels
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    /// Total bitrate in kbit/s
    pub bitrate: Option<f64>,
    /// Size in bytes when the extractor knows it
    pub content_length: Option<u64>,
    /// Headers the media host expects
    pub http_headers: HashMap<String, String>,
}

fn codec_present(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(c) if !c.is_empty() && c != "none")
}

impl StreamDescriptor {
    pub fn has_video(&self) -> bool {
        codec_present(&self.vcodec)
    }

    pub fn has_audio(&self) -> bool {
        codec_present(&self.acodec)
    }

    /// Vertical resolution: the explicit height, else the number in the quality label.
    pub fn resolution(&self) -> Option<u32> {
        self.height.or_else(|| {
            self.quality_label
                .as_deref()
                .and_then(|label| QUALITY_LABEL_RE.captures(label))
                .and_then(|caps| caps[1].parse().ok())
        })
    }
}

/// An open byte stream for one rendition.
pub struct OpenedStream {
    /// Content length reported by the host, if any.
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

/// Resolves watch links into renditions and opens their byte streams.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// List every rendition available for the video.
    async fn resolve(&self, link: &str) -> Result<Vec<StreamDescriptor>>;

    /// Open the byte stream of a rendition returned by [`resolve`](Self::resolve).
    async fn open(&self, stream: &StreamDescriptor) -> Result<OpenedStream>;
}

// yt-dlp JSON: only the fields pldl reads.

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    #[serde(default)]
    format_id: String,
    url: Option<String>,
    #[serde(default)]
    ext: String,
    format_note: Option<String>,
    height: Option<u32>,
    vcodec: Option<String>,
    acodec: Option<String>,
    tbr: Option<f64>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
    protocol: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

impl YtDlpFormat {
    /// Plain HTTP(S) renditions can be copied in a single request.
    fn is_single_request(&self) -> bool {
        match self.protocol.as_deref() {
            None => true,
            Some(p) => p == "https" || p == "http",
        }
    }

    fn into_descriptor(self) -> Option<StreamDescriptor> {
        if !self.is_single_request() {
            return None;
        }
        let url = self.url.filter(|u| !u.is_empty())?;
        Some(StreamDescriptor {
            format_id: self.format_id,
            url,
            ext: self.ext,
            quality_label: self.format_note,
            height: self.height,
            vcodec: self.vcodec,
            acodec: self.acodec,
            bitrate: self.tbr,
            content_length: self.filesize.or(self.filesize_approx),
            http_headers: self.http_headers,
        })
    }
}

/// Parse `yt-dlp --dump-single-json` output into descriptors.
///
/// Segmented renditions and entries without a URL are dropped.
pub fn parse_format_list(json: &str) -> Result<Vec<StreamDescriptor>> {
    let info: YtDlpInfo = serde_json::from_str(json).context("Failed to parse yt-dlp JSON output")?;
    Ok(info
        .formats
        .into_iter()
        .filter_map(YtDlpFormat::into_descriptor)
        .collect())
}

/// Production resolver backed by the yt-dlp program and a reqwest client.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: String,
    client: reqwest::Client,
}

impl YtDlpResolver {
    /// Use `$PLDL_YTDLP`, else `yt-dlp` from `PATH`.
    pub fn new() -> Result<Self> {
        let program = std::env::var(YTDLP_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_YTDLP.to_string());
        Self::with_program(program)
    }

    pub fn with_program(program: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            program: program.into(),
            client,
        })
    }
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(&self, link: &str) -> Result<Vec<StreamDescriptor>> {
        tracing::debug!("Resolving formats for {} with {}", link, self.program);

        let output = Command::new(&self.program)
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg(link)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    anyhow!(ExtractError::ToolMissing(self.program.clone()))
                } else {
                    anyhow!(e).context(format!("Failed to run {}", self.program))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .trim()
                .to_string();
            return Err(anyhow!(ExtractError::ToolFailed {
                link: link.to_string(),
                detail,
            }));
        }

        let json = String::from_utf8(output.stdout).context("yt-dlp output is not UTF-8")?;
        let streams = parse_format_list(&json)?;
        tracing::debug!("{} single-request renditions for {}", streams.len(), link);
        Ok(streams)
    }

    async fn open(&self, stream: &StreamDescriptor) -> Result<OpenedStream> {
        open_http(&self.client, stream).await
    }
}

/// GET a rendition's URL and expose the body as a byte stream.
pub async fn open_http(client: &reqwest::Client, stream: &StreamDescriptor) -> Result<OpenedStream> {
    let mut request = client.get(&stream.url);
    for (name, value) in &stream.http_headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request
        .send()
        .await
        .map_err(|e| anyhow!(e.without_url()).context("Failed to open media stream"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!(ExtractError::Http { status: status.as_u16() }));
    }

    let content_length = response.content_length();
    let body = response
        .bytes_stream()
        .map_err(|e| anyhow!(e.without_url()).context("Media stream interrupted"))
        .boxed();

    Ok(OpenedStream { content_length, body })
}
