//! Install command for the toolup CLI.
//!
//! Installs every configured tool, or only the named ones, into the bin
//! directory. Tools are processed in configuration order and a failing tool
//! does not stop the others.
//!
//! ## Usage
//!
//! ```bash
//! toolup install          # Install every tool in tools.yaml
//! toolup install yq jq    # Install only yq and jq
//! toolup                  # Same as `toolup install`
//! ```

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;

use super::GlobalOptions;
use crate::config::Config;
use crate::fetch::HttpFetcher;
use crate::install::Installer;
use crate::paths;

/// Arguments for the install command.
#[derive(Args, Debug, Default)]
pub struct InstallArgs {
    /// Names of the tools to install.
    ///
    /// If omitted, installs every tool in the configuration file.
    pub tools: Vec<String>,
}

/// Executes the install command.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file cannot be read or parsed
/// - A requested tool is not configured
/// - The bin directory cannot be determined or created
/// - Any tool fails to install
pub async fn execute(args: &InstallArgs, options: &GlobalOptions) -> Result<()> {
    let config = Config::load(&options.config)?;
    let tools = config.select(&args.tools).map_err(|name| {
        anyhow!(
            "Unknown tool '{name}': not listed in {}",
            options.config.display()
        )
    })?;

    if tools.is_empty() {
        println!("No tools configured in {}.", options.config.display());
        return Ok(());
    }

    let bin_dir = paths::bin_dir(options.bin_dir.as_deref())?;
    let installer = Installer::new(HttpFetcher::new(!options.quiet)?, &bin_dir);
    installer
        .prepare()
        .with_context(|| format!("Failed to prepare bin directory {}", bin_dir.display()))?;

    let total = tools.len();
    let report = installer.install_all(tools).await;

    if !report.is_success() {
        let failed: Vec<_> = report.failed.iter().map(|f| f.tool.as_str()).collect();
        bail!(
            "{} of {total} tools failed to install: {}",
            failed.len(),
            failed.join(", ")
        );
    }

    println!(
        "Installed {} tool{} into {}:",
        report.installed.len(),
        if report.installed.len() == 1 { "" } else { "s" },
        installer.bin_dir().display()
    );
    for tool in &report.installed {
        println!("  {} -> {}", tool.name, tool.path.display());
    }
    Ok(())
}
