//! # CLI Module
//!
//! User-facing commands of archivetube. Each command resolves its
//! collaborators from [`Settings`](crate::config::Settings), drives the
//! pipeline or the server, and reports through the `info!`, `success!`,
//! `warning!` and `error!` macros.
//!
//! ## Commands
//!
//! - [`auth`] - Google OAuth sign-in (PKCE) through the local callback server
//! - [`preview`] - dry run: collection summary and the metadata each video
//!   would get, no downloads
//! - [`process`] - full run up to a private playlist, then publish on
//!   `--publish` or after an interactive confirmation
//! - [`publish`] - makes an already processed collection public
//! - [`serve`] - web surface on the configured address
//!
//! ## Exit codes
//!
//! `0` when everything the command set out to do succeeded. `1` when the
//! collection cannot be fetched, authorization or quota fails, or at least
//! one track is left unfinished; running the same command again resumes.
//!
//! ## Typical session
//!
//! ```bash
//! archivetube auth
//! archivetube preview https://archive.org/details/gd1977-05-08
//! archivetube process https://archive.org/details/gd1977-05-08 --no-publish
//! archivetube publish gd1977-05-08
//! ```

mod auth;
mod preview;
mod process;
mod publish;
mod serve;

pub use auth::auth;
pub use preview::preview;
pub use process::process;
pub use publish::publish;
pub use serve::serve;
