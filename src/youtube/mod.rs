// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! YouTube Data API v3 integration for pldl.
//!
//! Only two endpoints are used: `playlists` to resolve a playlist's title and
//! `playlistItems` to page through its members. [`PlaylistSource`] is the
//! seam the manifest code talks to, so tests can count or fake API calls.
//!
//! # Example
//!
//! ```no_run
//! use pldl::youtube::{list_playlist, PlaylistSource, YoutubeClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = YoutubeClient::new("YOUR_API_KEY")?;
//! let title = client.playlist_title("PLxxxxxxxx").await?;
//! let videos = list_playlist(&client, "PLxxxxxxxx", Some(100)).await?;
//! println!("{}: {} videos", title, videos.len());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::download::types::VideoEntry;
use crate::error::ErrorBuilder;
use crate::utils::{mask_sensitive, sanitize_filename, watch_link};

/// Default Data API endpoint.
pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Largest `maxResults` the `playlistItems` endpoint accepts.
pub const API_PAGE_LIMIT: u32 = 50;

/// Timeout for a single API request (in seconds).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Error types specific to Data API operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YoutubeError {
    /// No API key has been configured.
    MissingApiKey,
    /// The playlist id resolved to zero playlists.
    PlaylistNotFound(String),
    /// The API answered with an error payload or a non-success status.
    Api { status: u16, message: String },
    /// Network or HTTP transport error.
    Network(String),
}

impl fmt::Display for YoutubeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "No YouTube API key configured"),
            Self::PlaylistNotFound(id) => write!(f, "Playlist not found: {}", id),
            Self::Api { status, message } => write!(f, "YouTube API error ({}): {}", status, message),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for YoutubeError {}

impl YoutubeError {
    /// Causes and fixes to show the user for this error.
    pub fn guidance(&self) -> ErrorBuilder {
        match self {
            Self::MissingApiKey => ErrorBuilder::new(self.to_string())
                .cause("No key has been saved yet")
                .fix("Create a key at https://console.cloud.google.com/apis/credentials")
                .fix("Save it: pldl setting.key=YOUR_API_KEY"),
            Self::PlaylistNotFound(_) => ErrorBuilder::new(self.to_string())
                .cause("The playlist is private or was deleted")
                .cause("The id was mistyped")
                .fix("Use the value after list= in the playlist URL"),
            Self::Api { status, .. } if *status == 400 || *status == 403 => {
                ErrorBuilder::new(self.to_string())
                    .cause("The API key is invalid or the YouTube Data API is not enabled for it")
                    .cause("The daily quota has been used up")
                    .fix("Check the key: pldl setting.key=YOUR_API_KEY")
                    .fix("Try again after the quota resets")
            }
            Self::Api { .. } => ErrorBuilder::new(self.to_string())
                .cause("The YouTube API rejected the request")
                .fix("Try again in a few minutes"),
            Self::Network(_) => ErrorBuilder::new(self.to_string())
                .cause("No internet connection")
                .cause("A proxy or firewall is blocking googleapis.com")
                .fix("Check your connection and run the same command again"),
        }
    }
}

/// One page of playlist members.
#[derive(Debug, Clone, Default)]
pub struct PlaylistPage {
    pub entries: Vec<VideoEntry>,
    pub next_page_token: Option<String>,
}

/// Anything that can resolve playlist titles and members.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Display title of the playlist.
    async fn playlist_title(&self, playlist_id: &str) -> Result<String>;

    /// One page of members, at most `page_size` long.
    async fn playlist_page(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage>;
}

/// Page through a whole playlist.
///
/// Stops when the API reports no further page, or once exactly `max_results`
/// entries have been collected. Any page failure aborts the listing; the
/// error says how many videos had been collected before it.
pub async fn list_playlist(
    source: &dyn PlaylistSource,
    playlist_id: &str,
    max_results: Option<u32>,
) -> Result<Vec<VideoEntry>> {
    let limit = max_results.map(|n| n as usize);
    let mut entries: Vec<VideoEntry> = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let remaining = match limit {
            Some(limit) => limit.saturating_sub(entries.len()),
            None => API_PAGE_LIMIT as usize,
        };
        if remaining == 0 {
            break;
        }
        let page_size = remaining.min(API_PAGE_LIMIT as usize) as u32;

        let page = source
            .playlist_page(playlist_id, page_size, page_token.as_deref())
            .await
            .with_context(|| {
                format!(
                    "Playlist listing failed after {} videos; nothing was saved",
                    entries.len()
                )
            })?;

        tracing::debug!(
            "Fetched {} playlist items (total {})",
            page.entries.len(),
            entries.len() + page.entries.len()
        );
        entries.extend(page.entries);

        if let Some(limit) = limit {
            entries.truncate(limit);
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(entries)
}

// Wire types. Only the fields pldl reads are declared.

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistListResponse {
    #[serde(default)]
    items: Vec<PlaylistResource>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    snippet: PlaylistSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemListResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: ItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    resource_id: Option<ResourceId>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl PlaylistItem {
    fn into_entry(self) -> Option<VideoEntry> {
        let snippet = self.snippet;
        let video_id = snippet.resource_id.and_then(|r| r.video_id)?;
        Some(VideoEntry {
            link: watch_link(&video_id),
            video_id,
            title: sanitize_filename(&snippet.title),
            description: snippet.description,
            thumbnail: snippet.thumbnails.default.map(|t| t.url).unwrap_or_default(),
        })
    }
}

/// Client for the YouTube Data API.
#[derive(Debug, Clone)]
pub struct YoutubeClient {
    /// Base URL for the API.
    base_url: String,
    /// API key sent with every request.
    api_key: String,
    /// HTTP client with configured timeouts.
    client: reqwest::Client,
}

impl YoutubeClient {
    /// Create a client against the public API endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    /// Create a client against a custom endpoint.
    pub fn with_base_url(api_key: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(anyhow!(YoutubeError::MissingApiKey));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, resource: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, resource);
        tracing::debug!(
            "GET {} {:?} (key {})",
            url,
            query,
            mask_sensitive(&self.api_key, 6)
        );

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| anyhow!(YoutubeError::Network(e.without_url().to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(anyhow!(YoutubeError::Api {
                status: status.as_u16(),
                message,
            }));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response", resource))
    }
}

#[async_trait]
impl PlaylistSource for YoutubeClient {
    async fn playlist_title(&self, playlist_id: &str) -> Result<String> {
        let response: PlaylistListResponse = self
            .get_json("playlists", &[("part", "snippet"), ("id", playlist_id)])
            .await?;

        response
            .items
            .into_iter()
            .next()
            .map(|p| p.snippet.title)
            .ok_or_else(|| anyhow!(YoutubeError::PlaylistNotFound(playlist_id.to_string())))
    }

    async fn playlist_page(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage> {
        let page_size = page_size.clamp(1, API_PAGE_LIMIT).to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response: PlaylistItemListResponse = self.get_json("playlistItems", &query).await?;

        let mut entries = Vec::with_capacity(response.items.len());
        for item in response.items {
            let title = item.snippet.title.clone();
            match item.into_entry() {
                Some(entry) => entries.push(entry),
                None => tracing::warn!("Skipping playlist item without a video id: {:?}", title),
            }
        }

        Ok(PlaylistPage {
            entries,
            next_page_token: response.next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(n: usize) -> VideoEntry {
        VideoEntry {
            video_id: format!("vid{}", n),
            title: format!("Video {}", n),
            description: String::new(),
            thumbnail: String::new(),
            link: watch_link(&format!("vid{}", n)),
        }
    }

    /// Serves `total` numbered videos, honouring page size and tokens.
    struct FakeSource {
        total: usize,
        fail_on_page: Option<usize>,
        page_sizes: std::sync::Mutex<Vec<u32>>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                fail_on_page: None,
                page_sizes: std::sync::Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PlaylistSource for FakeSource {
        async fn playlist_title(&self, _playlist_id: &str) -> Result<String> {
            Ok("Fake".to_string())
        }

        async fn playlist_page(
            &self,
            _playlist_id: &str,
            page_size: u32,
            page_token: Option<&str>,
        ) -> Result<PlaylistPage> {
            let page_no = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_page == Some(page_no) {
                return Err(anyhow!(YoutubeError::Network("connection reset".to_string())));
            }
            self.page_sizes.lock().unwrap().push(page_size);

            // Pages are always 50 wide on the server side, like the real API
            let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let end = (start + page_size as usize).min(self.total);
            Ok(PlaylistPage {
                entries: (start..end).map(entry).collect(),
                next_page_token: (end < self.total).then(|| end.to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_list_playlist_collects_every_page() {
        let source = FakeSource::new(120);
        let videos = list_playlist(&source, "PL", None).await.unwrap();
        assert_eq!(videos.len(), 120);
        assert_eq!(videos[0].video_id, "vid0");
        assert_eq!(videos[119].video_id, "vid119");
        assert_eq!(*source.page_sizes.lock().unwrap(), vec![50, 50, 50]);
    }

    #[tokio::test]
    async fn test_list_playlist_stops_at_exactly_max_results() {
        let source = FakeSource::new(120);
        let videos = list_playlist(&source, "PL", Some(24)).await.unwrap();
        assert_eq!(videos.len(), 24);
        assert_eq!(*source.page_sizes.lock().unwrap(), vec![24]);

        let source = FakeSource::new(120);
        let videos = list_playlist(&source, "PL", Some(75)).await.unwrap();
        assert_eq!(videos.len(), 75);
        assert_eq!(*source.page_sizes.lock().unwrap(), vec![50, 25]);
    }

    #[tokio::test]
    async fn test_list_playlist_max_results_larger_than_playlist() {
        let source = FakeSource::new(7);
        let videos = list_playlist(&source, "PL", Some(500)).await.unwrap();
        assert_eq!(videos.len(), 7);
    }

    #[tokio::test]
    async fn test_list_playlist_pagination_failure_is_fatal() {
        let mut source = FakeSource::new(120);
        source.fail_on_page = Some(1);
        let err = list_playlist(&source, "PL", None).await.unwrap_err();
        assert!(err.to_string().contains("after 50 videos"), "{}", err);
        assert!(err.downcast_ref::<YoutubeError>().is_some());
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let err = YoutubeClient::new("  ").unwrap_err();
        assert_eq!(err.downcast_ref::<YoutubeError>(), Some(&YoutubeError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_playlist_title_from_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .and(query_param("id", "PL1"))
            .and(query_param("key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [ { "snippet": { "title": "Road Trip" } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = YoutubeClient::with_base_url("k", server.uri()).unwrap();
        assert_eq!(client.playlist_title("PL1").await.unwrap(), "Road Trip");
    }

    #[tokio::test]
    async fn test_playlist_title_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
            .mount(&server)
            .await;

        let client = YoutubeClient::with_base_url("k", server.uri()).unwrap();
        let err = client.playlist_title("nope").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<YoutubeError>(),
            Some(&YoutubeError::PlaylistNotFound("nope".to_string()))
        );
    }

    #[tokio::test]
    async fn test_api_error_payload_surfaces_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": { "code": 403, "message": "quotaExceeded" }
            })))
            .mount(&server)
            .await;

        let client = YoutubeClient::with_base_url("k", server.uri()).unwrap();
        let err = client.playlist_title("PL1").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<YoutubeError>(),
            Some(&YoutubeError::Api { status: 403, message: "quotaExceeded".to_string() })
        );
    }

    #[tokio::test]
    async fn test_playlist_page_maps_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .and(query_param("playlistId", "PL1"))
            .and(query_param("maxResults", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nextPageToken": "CAIQAA",
                "items": [
                    { "snippet": {
                        "title": "Intro: what? <part 1>",
                        "description": "first",
                        "resourceId": { "kind": "youtube#video", "videoId": "abc" },
                        "thumbnails": { "default": { "url": "https://i.ytimg.com/vi/abc/default.jpg" } }
                    } },
                    { "snippet": { "title": "Deleted video", "description": "", "thumbnails": {} } }
                ]
            })))
            .mount(&server)
            .await;

        let client = YoutubeClient::with_base_url("k", server.uri()).unwrap();
        let page = client.playlist_page("PL1", 2, None).await.unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("CAIQAA"));
        assert_eq!(page.entries.len(), 1);
        let first = &page.entries[0];
        assert_eq!(first.video_id, "abc");
        assert_eq!(first.title, "Intro what part 1");
        assert_eq!(first.link, "https://www.youtube.com/watch?v=abc");
        assert_eq!(first.thumbnail, "https://i.ytimg.com/vi/abc/default.jpg");
    }
}
