//! Inspect command for the toolup CLI.
//!
//! Opens a local file the same way the installer opens a download and prints
//! what it finds. Useful for picking the `executable` value of a new tool.
//!
//! ## Output Format
//!
//! ```text
//! yq.tar.gz: tar.gz archive, 3 members
//!   0755       9437184  ./yq_linux_amd64
//!   0644          1076  yq.1
//!   0755             0  docs
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::archive::{ArchiveMember, ArchiveReader};

/// Arguments for the inspect command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Archive file to inspect.
    pub archive: PathBuf,
}

/// Executes the inspect command.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not a tar or zip
/// archive.
pub fn execute(args: &InspectArgs) -> Result<()> {
    let archive = ArchiveReader::open_path(&args.archive)
        .with_context(|| format!("Failed to open archive {}", args.archive.display()))?;

    let members = archive.members();
    println!(
        "{}: {} archive, {} member{}",
        args.archive.display(),
        archive.kind(),
        members.len(),
        if members.len() == 1 { "" } else { "s" }
    );
    for member in members {
        println!("{}", format_member(member));
    }

    Ok(())
}

fn format_member(member: &ArchiveMember) -> String {
    let mode = member
        .mode()
        .map_or_else(|| "-".to_string(), |m| format!("{:04o}", m & 0o7777));
    format!("  {mode:>4}  {:>12}  {}", member.size(), member.name())
}
