// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Unified ANSI color code definitions
//!
//! Single source of truth for the ANSI codes used by the CLI output and the
//! live progress line.
//!
//! Color usage conventions:
//! - RED = Errors/failures, download speed
//! - GREEN = Success, completed bar cells, sizes
//! - BRIGHT_GREEN = Remaining bar cells
//! - YELLOW = Warnings, retries
//! - BLUE = Time estimates
//! - MAGENTA = Counts and highlighted commands
//! - GRAY = Subtle secondary text

/// Reset all formatting
pub const RESET: &str = "\x1b[0m";

/// Dimmed/faint text
pub const DIM: &str = "\x1b[2m";

/// Red text (errors, failures, speed readout)
pub const RED: &str = "\x1b[31m";

/// Green text (success, completed cells, sizes)
pub const GREEN: &str = "\x1b[32m";

/// Light green text (remaining cells; may render as plain green on some terminals)
pub const BRIGHT_GREEN: &str = "\x1b[92m";

/// Yellow text (warnings, retries)
pub const YELLOW: &str = "\x1b[33m";

/// Blue text (time estimates)
pub const BLUE: &str = "\x1b[34m";

/// Cyan text (info messages, spinners)
pub const CYAN: &str = "\x1b[36m";

/// Magenta text (counts, highlighted commands, version)
pub const MAGENTA: &str = "\x1b[35m";

/// Bright black (gray) for subtle secondary text
pub const GRAY: &str = "\x1b[90m";

/// Symbols for status and feedback (no emoji)
pub mod symbols {
    pub const SUCCESS: &str = "[OK]";
    pub const ERROR: &str = "[X]";
    pub const WARNING: &str = "[!]";
    pub const INFO: &str = "[i]";
}
