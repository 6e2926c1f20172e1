//! Filesystem locations used by toolup.
//!
//! The install directory is chosen by:
//! 1. The `--bin-dir` command line flag
//! 2. The `XDG_BIN_HOME` environment variable, if set and non-empty
//! 3. `~/.local/bin` in the user's home directory

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable naming the user's executable directory.
pub const XDG_BIN_HOME_ENV: &str = "XDG_BIN_HOME";

/// Environment variable naming the tools configuration file.
pub const TOOLUP_CONFIG_ENV: &str = "TOOLUP_CONFIG";

/// Configuration file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "tools.yaml";

/// Resolves the bin directory from the process environment.
///
/// # Errors
///
/// Returns an error if neither a flag nor `XDG_BIN_HOME` is given and the
/// home directory cannot be determined.
pub fn bin_dir(flag: Option<&Path>) -> Result<PathBuf> {
    resolve_bin_dir(flag, std::env::var_os(XDG_BIN_HOME_ENV), dirs::home_dir())
        .context("Cannot determine home directory. Pass --bin-dir or set XDG_BIN_HOME.")
}

/// Pure form of [`bin_dir`].
#[must_use]
pub fn resolve_bin_dir(
    flag: Option<&Path>,
    xdg_bin_home: Option<OsString>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(flag) = flag {
        return Some(flag.to_path_buf());
    }
    if let Some(xdg) = xdg_bin_home.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg));
    }
    home.map(|h| h.join(".local").join("bin"))
}
