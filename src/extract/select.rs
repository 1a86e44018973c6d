// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rendition selection.
//!
//! Muxed (audio + video) renditions win, highest resolution first. Only
//! when none exist does a video-only MP4 get picked, highest bitrate first.

use std::cmp::Ordering;

use super::StreamDescriptor;

fn bitrate(stream: &StreamDescriptor) -> f64 {
    stream.bitrate.unwrap_or(0.0)
}

/// Resolution first (unknown sorts last), then bitrate.
fn by_resolution(a: &StreamDescriptor, b: &StreamDescriptor) -> Ordering {
    a.resolution()
        .cmp(&b.resolution())
        .then_with(|| bitrate(a).total_cmp(&bitrate(b)))
}

/// Bitrate first, then resolution.
fn by_bitrate(a: &StreamDescriptor, b: &StreamDescriptor) -> Ordering {
    bitrate(a)
        .total_cmp(&bitrate(b))
        .then_with(|| a.resolution().cmp(&b.resolution()))
}

/// Best rendition carrying both audio and video.
pub fn best_muxed(candidates: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    candidates
        .iter()
        .filter(|s| s.has_video() && s.has_audio())
        .max_by(|a, b| by_resolution(a, b))
}

/// Best video-only MP4 rendition.
pub fn best_video_only_mp4(candidates: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    candidates
        .iter()
        .filter(|s| s.has_video() && !s.has_audio() && s.ext.eq_ignore_ascii_case("mp4"))
        .max_by(|a, b| by_bitrate(a, b))
}

/// Pick the rendition to download, or `None` when nothing usable is offered.
pub fn select_stream(candidates: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    best_muxed(candidates).or_else(|| best_video_only_mp4(candidates))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(id: &str, label: Option<&str>, height: Option<u32>, video: bool, audio: bool) -> StreamDescriptor {
        StreamDescriptor {
            format_id: id.to_string(),
            url: format!("https://media/{}", id),
            ext: "mp4".to_string(),
            quality_label: label.map(str::to_string),
            height,
            vcodec: Some(if video { "avc1" } else { "none" }.to_string()),
            acodec: Some(if audio { "mp4a" } else { "none" }.to_string()),
            ..StreamDescriptor::default()
        }
    }

    #[test]
    fn test_prefers_highest_muxed_resolution() {
        let candidates = vec![
            stream("18", Some("360p"), None, true, true),
            stream("22", Some("720p"), None, true, true),
            stream("137", Some("1080p"), Some(1080), true, false),
            stream("140", None, None, false, true),
        ];
        assert_eq!(select_stream(&candidates).unwrap().format_id, "22");
    }

    #[test]
    fn test_unparsable_resolution_sorts_last() {
        let candidates = vec![
            stream("odd", Some("hd"), None, true, true),
            stream("18", Some("360p"), None, true, true),
        ];
        assert_eq!(best_muxed(&candidates).unwrap().format_id, "18");

        let only_odd = vec![stream("odd", Some("hd"), None, true, true)];
        assert_eq!(best_muxed(&only_odd).unwrap().format_id, "odd");
    }

    #[test]
    fn test_muxed_tie_broken_by_bitrate() {
        let mut low = stream("a", Some("720p"), None, true, true);
        low.bitrate = Some(900.0);
        let mut high = stream("b", Some("720p"), None, true, true);
        high.bitrate = Some(1500.0);
        let candidates = vec![high, low];
        assert_eq!(best_muxed(&candidates).unwrap().format_id, "b");
    }

    #[test]
    fn test_falls_back_to_video_only_mp4_by_bitrate() {
        let mut a = stream("137", Some("1080p"), Some(1080), true, false);
        a.bitrate = Some(4000.0);
        let mut b = stream("136", Some("720p"), Some(720), true, false);
        b.bitrate = Some(6000.0);
        let mut webm = stream("248", Some("1080p"), Some(1080), true, false);
        webm.ext = "webm".to_string();
        webm.bitrate = Some(9000.0);
        let audio = stream("140", None, None, false, true);

        let candidates = vec![a, b, webm, audio];
        assert_eq!(select_stream(&candidates).unwrap().format_id, "136");
    }

    #[test]
    fn test_nothing_usable() {
        let candidates = vec![stream("140", None, None, false, true)];
        assert!(select_stream(&candidates).is_none());
        assert!(select_stream(&[]).is_none());
    }
}
