// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! pldl - download every video of a YouTube playlist, one at a time.
//!
//! ```text
//! pldl <playlistId>            download (or resume) a playlist
//! pldl setting.<name>=<value>  change a setting
//! pldl -h | -v                 help / version
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use pldl::cli::{help_text, parse_invocation, version_text, Invocation};
use pldl::colors::symbols;
use pldl::colors::{GREEN, RED, RESET, YELLOW};
use pldl::download::{PlaylistRun, RunSummary};
use pldl::error::{describe_fatal, format_simple_error};
use pldl::extract::YtDlpResolver;
use pldl::settings::{apply_change, AppPaths, SettingChange, Settings};
use pldl::utils::count_noun;
use pldl::youtube::{PlaylistSource, YoutubeClient};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "PLDL_LOG";

/// Exit codes following sysexits.h conventions
/// These provide meaningful exit status to calling processes and scripts
mod exit_codes {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Usage error - invalid command line arguments
    pub const USAGE: i32 = 64;
    /// Temporary failure - some videos failed, run again to retry them
    pub const TEMP_FAIL: i32 = 75;
    /// Interrupted by Ctrl+C (128 + SIGINT)
    pub const INTERRUPTED: i32 = 130;
}

use exit_codes::*;

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_logging();

    let invocation = match parse_invocation(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{RED}{}{RESET} {}", symbols::ERROR, e);
            std::process::exit(ERROR);
        }
    };

    let code = match invocation {
        Invocation::Help => {
            print!("{}", help_text());
            SUCCESS
        }
        Invocation::Version => {
            println!("{}", version_text());
            SUCCESS
        }
        Invocation::UnknownFlag => {
            println!("Error: the flag does not exist");
            SUCCESS
        }
        Invocation::Usage(message) => {
            eprint!("{}", message);
            USAGE
        }
        Invocation::Setting(change) => change_setting(&change),
        Invocation::Download { playlist_id } => download(&playlist_id),
    };

    std::process::exit(code);
}

fn change_setting(change: &SettingChange) -> i32 {
    let result = AppPaths::discover().and_then(|paths| apply_change(&paths.settings_file(), change));
    match result {
        Ok(_) => {
            println!("{}", change.confirmation());
            SUCCESS
        }
        Err(e) => {
            eprintln!("{}", format_simple_error(&format!("Error writing settings file: {:#}", e)));
            ERROR
        }
    }
}

fn download(playlist_id: &str) -> i32 {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", format_simple_error(&format!("Failed to start async runtime: {}", e)));
            return ERROR;
        }
    };

    match runtime.block_on(download_playlist(playlist_id)) {
        Ok(summary) => report(playlist_id, &summary),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{}", describe_fatal(&e));
            ERROR
        }
    }
}

async fn download_playlist(playlist_id: &str) -> Result<RunSummary> {
    let paths = AppPaths::discover()?;
    let settings = Settings::load(&paths.settings_file())?;
    let root = std::env::current_dir().context("Could not determine the working directory")?;

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        cancel_flag.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not install Ctrl+C handler: {}", e);
    }

    let resolver = YtDlpResolver::new()?;
    let run = PlaylistRun::new(&paths, &settings, playlist_id, root).with_cancel(cancel);
    run.execute(
        || {
            let client = YoutubeClient::new(settings.api_key().unwrap_or_default())?;
            Ok(Box::new(client) as Box<dyn PlaylistSource>)
        },
        &resolver,
    )
    .await
}

/// Exit status for a finished run.
fn exit_code(summary: &RunSummary) -> i32 {
    if summary.interrupted {
        INTERRUPTED
    } else if !summary.failed.is_empty() {
        TEMP_FAIL
    } else {
        SUCCESS
    }
}

/// Print the outcome of a run and pick the exit code.
fn report(playlist_id: &str, summary: &RunSummary) -> i32 {
    if summary.interrupted {
        println!();
        println!(
            "{YELLOW}{}{RESET} Interrupted. {} left. Run {GREEN}pldl {}{RESET} to resume.",
            symbols::WARNING,
            count_noun(summary.remaining, "video"),
            playlist_id
        );
    } else if !summary.failed.is_empty() {
        println!();
        println!(
            "{RED}{}{RESET} {} could not be downloaded:",
            symbols::ERROR,
            count_noun(summary.failed.len(), "video")
        );
        for failed in &summary.failed {
            println!("    {} ({}): {}", failed.title, failed.video_id, failed.error);
        }
        println!("Run {GREEN}pldl {}{RESET} again to retry them.", playlist_id);
    }

    exit_code(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pldl::download::FailedEntry;

    #[test]
    fn test_exit_code_for_summaries() {
        assert_eq!(exit_code(&RunSummary::default()), SUCCESS);

        let failed = RunSummary {
            completed: 2,
            failed: vec![FailedEntry {
                video_id: "a".to_string(),
                title: "A".to_string(),
                error: "HTTP 403".to_string(),
                attempts: 3,
            }],
            remaining: 1,
            interrupted: false,
        };
        assert_eq!(exit_code(&failed), TEMP_FAIL);

        // An interrupt wins over earlier failures
        let interrupted = RunSummary {
            interrupted: true,
            ..failed
        };
        assert_eq!(exit_code(&interrupted), INTERRUPTED);
    }

    #[test]
    fn test_out_of_range_setting_is_rejected_before_writing() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let paths = AppPaths::at(dir.path());

        assert!(parse_invocation(["pldl", "setting.progStyle=9"]).is_err());
        assert!(!paths.settings_file().exists());

        let Ok(Invocation::Setting(change)) = parse_invocation(["pldl", "setting.progStyle=8"]) else {
            panic!("progStyle=8 should parse");
        };
        apply_change(&paths.settings_file(), &change).unwrap();
        assert_eq!(Settings::load(&paths.settings_file()).unwrap().progress_style, 8);
    }
}
