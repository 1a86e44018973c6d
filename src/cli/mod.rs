// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Command-line surface for pldl.
//!
//! pldl takes a single argument: a playlist id, a `setting.<name>=<value>`
//! command, or one of the help/version flags. clap does the tokenizing;
//! [`Invocation`] says what the user asked for.

use std::ffi::OsString;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{ArgAction, Parser};

use crate::colors::{MAGENTA, RESET};
use crate::settings::{SettingChange, SettingError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Download every video of a YouTube playlist.
#[derive(Parser, Debug)]
#[command(name = "pldl")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Display usage information
    #[arg(short = 'h', long = "help", alias = "h", action = ArgAction::SetTrue)]
    pub help: bool,

    /// Display version number
    #[arg(short = 'v', long = "version", alias = "v", action = ArgAction::SetTrue)]
    pub version: bool,

    /// Playlist id, or a `setting.<name>=<value>` command
    pub target: Option<String>,
}

/// What a command line asks pldl to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Help,
    Version,
    /// A leading-dash argument pldl does not know
    UnknownFlag,
    /// Any other malformed command line, with clap's message
    Usage(String),
    Setting(SettingChange),
    Download { playlist_id: String },
}

impl Cli {
    pub fn into_invocation(self) -> Result<Invocation, SettingError> {
        if self.help {
            return Ok(Invocation::Help);
        }
        if self.version {
            return Ok(Invocation::Version);
        }
        let Some(target) = self.target.filter(|t| !t.trim().is_empty()) else {
            return Ok(Invocation::Help);
        };

        match SettingChange::parse(&target)? {
            Some(change) => Ok(Invocation::Setting(change)),
            None => Ok(Invocation::Download {
                playlist_id: target.trim().to_string(),
            }),
        }
    }
}

/// Parse a full argument list (program name first).
pub fn parse_invocation<I, T>(args: I) -> Result<Invocation, SettingError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => cli.into_invocation(),
        Err(e) if e.kind() == ErrorKind::UnknownArgument && is_flag_error(&e) => Ok(Invocation::UnknownFlag),
        Err(e) => Ok(Invocation::Usage(e.to_string())),
    }
}

/// clap also reports surplus positionals as unknown arguments.
fn is_flag_error(err: &clap::Error) -> bool {
    match err.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => arg.starts_with('-'),
        _ => true,
    }
}

pub fn version_text() -> String {
    format!("pldl/{MAGENTA}{}{RESET}", VERSION)
}

pub fn help_text() -> String {
    let mut text = String::new();
    text.push_str("Usage: pldl {playlistID}\n");
    text.push_str("Replace {playlistID} with the ID of the YouTube playlist you want to download.\n");
    text.push_str("\nOptions:\n\n");
    text.push_str("  -h, --h, --help      Display usage information\n");
    text.push_str("  -v, --v, --version   Display version number\n");
    text.push_str("\nSettings:\n\n");
    text.push_str(&format!(
        "  API Key: Set your YouTube API key using {MAGENTA}pldl setting.key='YOUR_API_KEY'{RESET}\n"
    ));
    text.push_str(&format!(
        "  Playlist Folder: Set the {MAGENTA}pldl setting.plFolder{RESET} to 'true' or 'false' to enable or disable playlist folders\n"
    ));
    text.push_str(&format!(
        "  Max Result: {MAGENTA}pldl setting.maxResults=240{RESET}  This setting allows you to control the number of videos to download from the playlist\n"
    ));
    text.push_str(&format!(
        "  Progress Style: {MAGENTA}pldl setting.progStyle=3{RESET}  Pick one of the progress bar styles 1-8\n"
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation, SettingError> {
        parse_invocation(std::iter::once("pldl").chain(args.iter().copied()))
    }

    #[test]
    fn test_help_and_version_flags() {
        for flag in ["-h", "--h", "--help"] {
            assert_eq!(parse(&[flag]).unwrap(), Invocation::Help, "{}", flag);
        }
        for flag in ["-v", "--v", "--version"] {
            assert_eq!(parse(&[flag]).unwrap(), Invocation::Version, "{}", flag);
        }
        assert_eq!(parse(&[]).unwrap(), Invocation::Help);
    }

    #[test]
    fn test_unknown_flag() {
        assert_eq!(parse(&["--nope"]).unwrap(), Invocation::UnknownFlag);
        assert_eq!(parse(&["-x"]).unwrap(), Invocation::UnknownFlag);
    }

    #[test]
    fn test_playlist_id() {
        assert_eq!(
            parse(&["PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf"]).unwrap(),
            Invocation::Download {
                playlist_id: "PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf".to_string()
            }
        );
    }

    #[test]
    fn test_setting_commands() {
        assert_eq!(
            parse(&["setting.progStyle=3"]).unwrap(),
            Invocation::Setting(SettingChange::ProgressStyle(3))
        );
        assert!(matches!(
            parse(&["setting.progStyle=9"]),
            Err(SettingError::OutOfRange { .. })
        ));
        assert!(matches!(parse(&["setting.colour=red"]), Err(SettingError::Unknown(_))));
    }

    #[test]
    fn test_extra_arguments_are_usage_errors() {
        assert!(matches!(parse(&["PL1", "PL2"]).unwrap(), Invocation::Usage(_)));
    }

    #[test]
    fn test_texts() {
        assert!(version_text().contains(VERSION));
        assert!(version_text().starts_with("pldl/"));
        let help = help_text();
        assert!(help.starts_with("Usage: pldl {playlistID}"));
        assert!(help.contains("-v, --v, --version"));
        assert!(help.contains("setting.maxResults=240"));
    }
}
