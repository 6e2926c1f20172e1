#![warn(clippy::pedantic)]

//! # toolup
//!
//! Installs developer tools from release archives into a bin directory.
//!
//! Tools are listed in a YAML file. For each tool, toolup renders its
//! download URL, fetches the archive, detects whether it is a tar (plain,
//! gzip, bzip2, xz or zstd) or zip file by content, and copies the named
//! executable out of it with mode `0o755`.
//!
//! ## Examples
//!
//! Install every configured tool:
//! ```bash
//! toolup
//! ```
//!
//! Install one tool into a custom directory:
//! ```bash
//! toolup --bin-dir ~/bin install yq
//! ```
//!
//! Look inside a downloaded archive:
//! ```bash
//! toolup inspect yq_linux_amd64.tar.gz
//! ```

mod archive;
mod commands;
mod config;
mod errors;
mod fetch;
mod install;
mod logging;
mod paths;
mod template;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use commands::{GlobalOptions, inspect, install as install_cmd, list};

/// Developer tool installer.
#[derive(Parser)]
#[command(
    name = "toolup",
    author,
    version,
    about = "Install developer tools from release archives",
    long_about = "toolup downloads the release archive of each tool listed in a YAML \
    configuration file and installs the tool's executable into a bin directory. \
    Running it without a subcommand installs every configured tool.",
    after_help = "\
BIN DIRECTORY:
    Executables are installed into the first of:
    1. --bin-dir
    2. $XDG_BIN_HOME
    3. ~/.local/bin

ENVIRONMENT VARIABLES:
    TOOLUP_CONFIG           Tools configuration file (default: tools.yaml)
    XDG_BIN_HOME            Install directory (default: ~/.local/bin)
    TOOLUP_LOG              Log filter directives, e.g. 'toolup=debug'"
)]
pub struct Cli {
    /// Path to the tools configuration file.
    #[arg(
        long,
        short = 'c',
        global = true,
        env = paths::TOOLUP_CONFIG_ENV,
        default_value = paths::DEFAULT_CONFIG_FILE,
        value_name = "PATH"
    )]
    pub config: PathBuf,

    /// Directory to install executables into.
    #[arg(long, global = true, value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only print errors and hide download progress.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the toolup CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install configured tools.
    ///
    /// Installs every tool in the configuration file, or only the named
    /// ones, in configuration order. A failing tool does not stop the rest;
    /// the exit code is 1 if any tool failed.
    Install(install_cmd::InstallArgs),

    /// List configured tools with their download URLs.
    List,

    /// Show the detected format and members of a local archive.
    Inspect(inspect::InspectArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints an error with its cause chain and returns the exit code.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:?}");
    1
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet)?;

    let options = GlobalOptions {
        config: cli.config,
        bin_dir: cli.bin_dir,
        quiet: cli.quiet,
    };

    match cli.command {
        Some(Commands::Install(args)) => install_cmd::execute(&args, &options).await,
        Some(Commands::List) => list::execute(&options),
        Some(Commands::Inspect(args)) => inspect::execute(&args),
        None => install_cmd::execute(&install_cmd::InstallArgs::default(), &options).await,
    }
}
