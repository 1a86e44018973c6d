// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Live progress readout for the video being downloaded.
//!
//! One terminal line is rewritten in place:
//!
//! ```text
//!      [████████████░░░░░░░░] 12.40 MB/24.80 MB | 1.02 MB/s | est: 00:00:12
//! ```

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use crate::colors::{BLUE, BRIGHT_GREEN, CYAN, DIM, GRAY, GREEN, MAGENTA, RED, RESET, YELLOW};

/// Number of cells in the progress bar.
pub const BAR_WIDTH: usize = 40;

/// How often throughput is recomputed.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human-readable size with two decimals, e.g. `1.50 KB`.
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 B".to_string();
    }
    let mut value = bytes;
    let mut index = 0;
    while value >= 1024.0 && index < UNITS.len() - 1 {
        value /= 1024.0;
        index += 1;
    }
    format!("{:.2} {}", value, UNITS[index])
}

/// `HH:MM:SS`; negative or non-finite input renders as zero.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Glyphs and colors for one progress bar style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarStyle {
    pub done: char,
    pub todo: char,
    pub done_color: &'static str,
    pub todo_color: &'static str,
}

const STYLES: [BarStyle; 8] = [
    BarStyle { done: '█', todo: '░', done_color: GREEN, todo_color: BRIGHT_GREEN },
    BarStyle { done: '#', todo: '-', done_color: CYAN, todo_color: DIM },
    BarStyle { done: '=', todo: ' ', done_color: YELLOW, todo_color: RESET },
    BarStyle { done: '■', todo: '□', done_color: BLUE, todo_color: GRAY },
    BarStyle { done: '●', todo: '○', done_color: MAGENTA, todo_color: GRAY },
    BarStyle { done: '▓', todo: '░', done_color: GREEN, todo_color: DIM },
    BarStyle { done: '>', todo: '.', done_color: CYAN, todo_color: GRAY },
    BarStyle { done: '|', todo: ' ', done_color: RED, todo_color: RESET },
];

impl BarStyle {
    /// Style for a `progStyle` value. Anything outside 1..=8 gets style 1.
    pub fn from_setting(style: u8) -> Self {
        match style {
            1..=8 => STYLES[(style - 1) as usize],
            _ => STYLES[0],
        }
    }
}

/// Number of filled cells for `percent`, clamped into 0..=100.
pub fn completed_cells(percent: f64) -> usize {
    let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
    (percent / 100.0 * BAR_WIDTH as f64).round() as usize
}

/// A `[...]` bar of [`BAR_WIDTH`] cells.
pub fn progress_bar(percent: f64, style: u8) -> String {
    let style = BarStyle::from_setting(style);
    let completed = completed_cells(percent);
    let remaining = BAR_WIDTH - completed;
    format!(
        "[{}{}{}{}{}]",
        style.done_color,
        style.done.to_string().repeat(completed),
        style.todo_color,
        style.todo.to_string().repeat(remaining),
        RESET
    )
}

/// Throughput measured over the last sampling window.
#[derive(Debug, Clone)]
pub struct ThroughputSampler {
    last_bytes: u64,
    last_at: Instant,
    rate: f64,
}

impl ThroughputSampler {
    pub fn new(now: Instant) -> Self {
        Self {
            last_bytes: 0,
            last_at: now,
            rate: 0.0,
        }
    }

    /// Recompute the rate from the bytes received since the previous sample.
    pub fn sample(&mut self, received: u64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_at).as_secs_f64();
        if elapsed > 0.0 {
            self.rate = received.saturating_sub(self.last_bytes) as f64 / elapsed;
            self.last_bytes = received;
            self.last_at = now;
        }
        self.rate
    }

    /// Bytes per second as of the last sample.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

/// Bytes received so far for one video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub received: u64,
    pub total: Option<u64>,
    /// Bytes per second
    pub rate: f64,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => self.received as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }

    /// Seconds left, known only when the total is known and bytes are flowing.
    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.total?;
        if self.rate <= 0.0 {
            return None;
        }
        Some((total.saturating_sub(self.received) as f64 / self.rate).max(0.0))
    }
}

/// Text of the progress line, without cursor control.
pub fn render_line(snapshot: &ProgressSnapshot, style: u8) -> String {
    let total = snapshot
        .total
        .map(|t| format_bytes(t as f64))
        .unwrap_or_else(|| "?".to_string());
    let eta = snapshot
        .eta_secs()
        .map(format_time)
        .unwrap_or_else(|| "--:--:--".to_string());
    format!(
        "     {} {GREEN}{}/{}{RESET} | {RED}{}/s{RESET} |{BLUE} est: {}{RESET}",
        progress_bar(snapshot.percent(), style),
        format_bytes(snapshot.received as f64),
        total,
        format_bytes(snapshot.rate),
        eta,
    )
}

/// Writer that keeps redrawing a single terminal line.
pub struct ProgressLine<W: Write> {
    out: W,
    style: u8,
    drawn: bool,
}

impl ProgressLine<io::Stdout> {
    pub fn stdout(style: u8) -> Self {
        Self::new(io::stdout(), style)
    }
}

impl<W: Write> ProgressLine<W> {
    pub fn new(out: W, style: u8) -> Self {
        Self {
            out,
            style,
            drawn: false,
        }
    }

    /// Overwrite the line with the current snapshot.
    pub fn draw(&mut self, snapshot: &ProgressSnapshot) -> io::Result<()> {
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::UntilNewLine),
            Print(render_line(snapshot, self.style))
        )?;
        self.drawn = true;
        self.out.flush()
    }

    /// Leave the last drawn line on screen and move to the next one.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.drawn {
            writeln!(self.out)?;
            self.drawn = false;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
