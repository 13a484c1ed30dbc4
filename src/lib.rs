//! archivetube library
//!
//! Republishes an archive.org audio collection as a YouTube playlist: every
//! track becomes a still-image video, uploaded privately, collected into a
//! playlist and published only on request. Runs are resumable from the files
//! left in the work directory and from the videos already on the channel.
//!
//! # Modules
//!
//! - `api` - HTTP endpoints of the `serve` command
//! - `archive` - archive.org metadata and downloads
//! - `cli` - Command-line interface implementations
//! - `config` - Settings and environment variables
//! - `error` - Pipeline error taxonomy
//! - `format` - Video and playlist titles and descriptions
//! - `management` - Token cache and run manifest
//! - `media` - ffmpeg encoding and ffprobe validation
//! - `pipeline` - The stages of a run
//! - `retry` - Backoff for idempotent requests
//! - `server` - Local HTTP server (OAuth callback and web surface)
//! - `types` - Data structures and wire formats
//! - `utils` - Parsing and text helpers
//! - `youtube` - YouTube Data API client

pub mod api;
pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod management;
pub mod media;
pub mod pipeline;
pub mod retry;
pub mod server;
pub mod types;
pub mod utils;
pub mod youtube;

/// Boxed error alias for top-level glue code (server startup, CLI plumbing).
///
/// Pipeline stages return [`error::PipelineResult`] instead.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// Accepts the same arguments as `println!`.
///
/// # Example
///
/// ```ignore
/// info!("Fetching {}", identifier);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```ignore
/// success!("Uploaded {} videos", count);
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program
/// with code 1.
///
/// Only for failures the user has to act on; code after the call does not
/// run.
///
/// # Example
///
/// ```ignore
/// error!("Cannot load environment. Err: {}", e);
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// # Example
///
/// ```ignore
/// warning!("Track {} failed: {}", number, message);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
