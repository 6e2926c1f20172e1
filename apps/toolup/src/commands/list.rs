//! List command for the toolup CLI.
//!
//! ## Output Format
//!
//! ```text
//! Configured tools (tools.yaml):
//!   yq   v4.44.1  https://github.com/mikefarah/yq/releases/download/v4.44.1/yq_linux_amd64.tar.gz
//!   jq   1.7      <template error: unknown field `os` in `https://x/{os}`>
//! ```

use anyhow::Result;

use super::GlobalOptions;
use crate::config::Config;

/// Executes the list command.
///
/// Rendering failures are shown in place of the URL; they do not fail the
/// command.
///
/// # Errors
///
/// Returns an error if the configuration file cannot be read or parsed.
pub fn execute(options: &GlobalOptions) -> Result<()> {
    let config = Config::load(&options.config)?;

    if config.tools.is_empty() {
        println!("No tools configured in {}.", options.config.display());
        return Ok(());
    }

    let name_width = config.tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let version_width = config.tools.iter().map(|t| t.version.len()).max().unwrap_or(0);

    println!("Configured tools ({}):", options.config.display());
    for tool in &config.tools {
        let url = tool
            .download_url()
            .unwrap_or_else(|e| format!("<{e}>"));
        println!(
            "  {:name_width$}  {:version_width$}  {url}",
            tool.name, tool.version
        );
    }

    Ok(())
}
