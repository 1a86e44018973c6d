// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Spinner helpers for consistent progress indicators
//!
//! Used while waiting on the Data API and on yt-dlp. indicatif hides the
//! spinner when stderr is not a terminal.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::colors::symbols::SUCCESS;
use crate::colors::{GREEN, RESET};

/// Create a spinner with consistent styling
pub fn create(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("\u{28FB}\u{28F9}\u{28FC}\u{28F8}\u{28FE}\u{28F6}\u{28F7}\u{28E7}\u{28CF}\u{28DF} ")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Finish spinner with success message
pub fn finish_success(spinner: &ProgressBar, message: &str) {
    spinner.finish_and_clear();
    println!("{GREEN}{SUCCESS}{RESET} {}", message);
}

/// Clear spinner silently (before an error or the progress line is printed)
pub fn clear(spinner: &ProgressBar) {
    spinner.finish_and_clear();
}
