//! Subcommand implementations for the toolup CLI.
//!
//! - [`install`] - Download and install configured tools
//! - [`list`] - Show configured tools and their download URLs
//! - [`inspect`] - Show the format and members of a local archive

pub mod inspect;
pub mod install;
pub mod list;

use std::path::PathBuf;

/// Options shared by every subcommand, resolved from global flags.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Tools configuration file.
    pub config: PathBuf,
    /// Bin directory given on the command line, if any.
    pub bin_dir: Option<PathBuf>,
    /// Suppress download progress.
    pub quiet: bool,
}
