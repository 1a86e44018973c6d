// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for pldl.
//!
//! Small string helpers shared by the manifest, download and settings code.

/// Characters that are not allowed in file names on at least one supported platform.
pub const INVALID_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Base URL for a single video page; the video id is appended.
pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Strip characters that cannot appear in a file name.
///
/// Only the characters in [`INVALID_FILENAME_CHARS`] are removed; everything
/// else (spaces, unicode, dots) is left untouched, so sanitizing an already
/// clean name returns it unchanged.
///
/// # Examples
///
/// ```
/// use pldl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("AC/DC: Live?"), "ACDC Live");
/// assert_eq!(sanitize_filename("plain name"), "plain name");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c))
        .collect()
}

/// Build the watch link for a video id.
pub fn watch_link(video_id: &str) -> String {
    format!("{}{}", WATCH_URL, video_id)
}

/// Mask a sensitive string (like API keys) for logging.
///
/// Shows only the first `visible_prefix` characters and replaces the rest with "...".
/// This ensures API keys are never logged in full.
///
/// # Examples
///
/// ```
/// use pldl::utils::mask_sensitive;
///
/// let api_key = "AIzaSyD-abcdefghijklmnopqrstuvwxyz";
/// let masked = mask_sensitive(api_key, 6);
/// assert_eq!(masked, "AIzaSy...");
/// ```
pub fn mask_sensitive(input: &str, visible_prefix: usize) -> String {
    if input.chars().count() <= visible_prefix {
        // Nothing would be hidden, so show nothing
        return "...".to_string();
    }

    let prefix: String = input.chars().take(visible_prefix).collect();
    format!("{}...", prefix)
}

/// `"1 video"`, `"3 videos"`.
///
/// ```
/// use pldl::utils::count_noun;
///
/// assert_eq!(count_noun(1, "video"), "1 video");
/// assert_eq!(count_noun(0, "video"), "0 videos");
/// ```
pub fn count_noun(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
