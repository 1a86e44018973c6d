// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Consistent error formatting for pldl.
//!
//! Fatal errors are printed with the title, possible causes, suggested fixes
//! and a help link, so a failed run always tells the user what to try next.

use std::fmt;

/// Issue tracker URL for support.
pub const ISSUES_URL: &str = "https://github.com/morganforge/pldl/issues";

/// Formats an error message with title, causes, fixes, and help link.
///
/// # Example
///
/// ```
/// use pldl::error::format_error;
///
/// let error = format_error(
///     "Playlist not found",
///     &["The playlist is private", "The id was mistyped"],
///     &["Check the id in the playlist URL (the part after list=)"],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = String::new();

    output.push_str(&format!("[✗] {}\n\n", title));

    if !causes.is_empty() {
        output.push_str("Possible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
        output.push('\n');
    }

    if !fixes.is_empty() {
        output.push_str("Try these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
        output.push('\n');
    }

    output.push_str(&format!("Need help? {}", ISSUES_URL));

    output
}

/// Formats a simple error with just a title and help link.
pub fn format_simple_error(title: &str) -> String {
    format!("[✗] {}\n\nNeed help? {}", title, ISSUES_URL)
}

/// Builder for constructing formatted error messages.
///
/// # Example
///
/// ```
/// use pldl::error::ErrorBuilder;
///
/// let error = ErrorBuilder::new("Missing API key")
///     .cause("No key has been saved yet")
///     .fix("Save one: pldl setting.key=YOUR_API_KEY")
///     .build();
/// assert!(error.contains("pldl setting.key="));
/// ```
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    /// Create a new error builder with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Add a possible cause.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a suggested fix.
    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    /// Build the formatted error message.
    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}

/// Render a fatal `anyhow` error chain for the terminal.
///
/// Known domain errors get their tailored causes and fixes; anything else is
/// shown with its full context chain.
pub fn describe_fatal(err: &anyhow::Error) -> String {
    if let Some(yt) = err.downcast_ref::<crate::youtube::YoutubeError>() {
        return yt.guidance().build();
    }
    if let Some(ex) = err.downcast_ref::<crate::extract::ExtractError>() {
        return ex.guidance().build();
    }

    let mut builder = ErrorBuilder::new(err.to_string());
    for cause in err.chain().skip(1) {
        builder = builder.cause(cause.to_string());
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        let error = format_error(
            "Test Error",
            &["Cause 1", "Cause 2"],
            &["Fix 1", "Fix 2"],
        );

        assert!(error.contains("[✗] Test Error"));
        assert!(error.contains("Possible causes:"));
        assert!(error.contains("  - Cause 1"));
        assert!(error.contains("  - Cause 2"));
        assert!(error.contains("Try these fixes:"));
        assert!(error.contains("  1. Fix 1"));
        assert!(error.contains("  2. Fix 2"));
        assert!(error.contains(ISSUES_URL));
    }

    #[test]
    fn test_format_simple_error() {
        let error = format_simple_error("Simple error");
        assert!(error.contains("[✗] Simple error"));
        assert!(error.contains(ISSUES_URL));
    }

    #[test]
    fn test_error_builder_display() {
        let builder = ErrorBuilder::new("Display test")
            .cause("Cause")
            .fix("Fix");

        let error = format!("{}", builder);
        assert!(error.contains("[✗] Display test"));
        assert!(error.contains("  1. Fix"));
    }

    #[test]
    fn test_empty_causes_and_fixes() {
        let error = format_error("Empty test", &[], &[]);
        assert!(!error.contains("Possible causes:"));
        assert!(!error.contains("Try these fixes:"));
    }

    #[test]
    fn test_describe_fatal_shows_context_chain() {
        let err = anyhow::anyhow!("permission denied").context("Failed to create folder: /music");
        let text = describe_fatal(&err);
        assert!(text.contains("[✗] Failed to create folder: /music"));
        assert!(text.contains("  - permission denied"));
    }

    #[test]
    fn test_describe_fatal_uses_domain_guidance() {
        let err = anyhow::Error::new(crate::youtube::YoutubeError::MissingApiKey);
        let text = describe_fatal(&err);
        assert!(text.contains("setting.key="));
    }
}
