//! The per-tool install pipeline.
//!
//! For each tool: render the download URL, fetch it into a fresh temporary
//! directory, open the download as an archive, find the executable member
//! and copy it into the bin directory with mode `0o755`.
//!
//! Resources are scoped: the archive reader lives inside the temporary
//! directory's scope and is dropped first, and the temporary directory is
//! removed on every exit path. Nothing is created in the bin directory until
//! the executable member is known to exist, and the destination only appears
//! once fully written.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveReader};
use crate::config::ToolDescriptor;
use crate::errors::ToolupError;
use crate::fetch::Fetcher;

/// Chunk size used when copying the executable out of the archive.
const COPY_CHUNK_LEN: usize = 10 * 1024;

/// File name of the download inside the temporary directory.
const DOWNLOAD_FILE_NAME: &str = "download";

/// Mode applied to every installed executable.
#[cfg(unix)]
const EXECUTABLE_MODE: u32 = 0o755;

/// Stage of the pipeline at which a tool failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    RenderUrl,
    CreateTempDir,
    Fetch,
    OpenArchive,
    ResolveExecutable,
    Write,
    SetPermissions,
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RenderUrl => "render download URL",
            Self::CreateTempDir => "create temporary directory",
            Self::Fetch => "download",
            Self::OpenArchive => "open archive",
            Self::ResolveExecutable => "find executable",
            Self::Write => "write executable",
            Self::SetPermissions => "set permissions",
        })
    }
}

/// A failed install, with enough context to tell the user what went wrong.
#[derive(Debug, Error)]
#[error("{tool} {version}: failed to {step}: {error}")]
pub struct ToolFailure {
    pub tool: String,
    pub version: String,
    pub step: InstallStep,
    #[source]
    pub error: ToolupError,
}

/// A successfully installed tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledTool {
    pub name: String,
    pub path: PathBuf,
}

/// Outcome of [`Installer::install_all`].
#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<InstalledTool>,
    pub failed: Vec<ToolFailure>,
}

impl InstallReport {
    /// True when no tool failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

type StepResult<T> = Result<T, (InstallStep, ToolupError)>;

/// Tags an error with the step it happened in.
trait AtStep<T> {
    fn at(self, step: InstallStep) -> StepResult<T>;
}

impl<T, E: Into<ToolupError>> AtStep<T> for Result<T, E> {
    fn at(self, step: InstallStep) -> StepResult<T> {
        self.map_err(|e| (step, e.into()))
    }
}

/// Installs tools into a bin directory.
pub struct Installer<F> {
    fetcher: F,
    bin_dir: PathBuf,
    temp_root: Option<PathBuf>,
}

impl<F: Fetcher> Installer<F> {
    /// Creates an installer writing into `bin_dir`.
    #[must_use]
    pub fn new(fetcher: F, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            bin_dir: bin_dir.into(),
            temp_root: None,
        }
    }

    /// Creates the per-tool temporary directories below `root` instead of the
    /// system temporary directory.
    #[cfg(test)]
    #[must_use]
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Creates the bin directory and the temporary root, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ToolupError::IoError`] if a directory cannot be created.
    pub fn prepare(&self) -> Result<(), ToolupError> {
        for dir in std::iter::once(&self.bin_dir).chain(self.temp_root.as_ref()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                ToolupError::io_error(format!("failed to create {}", dir.display()), e)
            })?;
        }
        Ok(())
    }

    /// Installs every tool in order. A failing tool is reported and skipped.
    pub async fn install_all<'a, I>(&self, tools: I) -> InstallReport
    where
        I: IntoIterator<Item = &'a ToolDescriptor>,
    {
        let mut report = InstallReport::default();

        for tool in tools {
            println!("Installing {} version {}", tool.name, tool.version);
            match self.install(tool).await {
                Ok(path) => report.installed.push(InstalledTool {
                    name: tool.name.clone(),
                    path,
                }),
                Err(failure) => {
                    tracing::debug!(
                        tool = %failure.tool,
                        version = %failure.version,
                        step = %failure.step,
                        error = %failure.error,
                        "Install failed"
                    );
                    eprintln!("Error: {}", error_chain(&failure));
                    report.failed.push(failure);
                }
            }
        }

        report
    }

    /// Installs a single tool and returns the path of the installed
    /// executable.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolFailure`] naming the step that failed.
    pub async fn install(&self, tool: &ToolDescriptor) -> Result<PathBuf, ToolFailure> {
        self.run(tool).await.map_err(|(step, error)| ToolFailure {
            tool: tool.name.clone(),
            version: tool.version.clone(),
            step,
            error,
        })
    }

    async fn run(&self, tool: &ToolDescriptor) -> StepResult<PathBuf> {
        let url = tool.download_url().at(InstallStep::RenderUrl)?;
        let dest = self.destination(&tool.executable).at(InstallStep::Write)?;

        let temp_dir = self.temp_dir().at(InstallStep::CreateTempDir)?;
        let download = temp_dir.path().join(DOWNLOAD_FILE_NAME);

        tracing::info!(tool = %tool.name, %url, "Downloading");
        self.fetcher
            .fetch(&url, &download)
            .await
            .at(InstallStep::Fetch)?;

        {
            let mut archive = ArchiveReader::open_path(&download).at(InstallStep::OpenArchive)?;
            tracing::debug!(tool = %tool.name, kind = %archive.kind(), "Opened archive");

            println!("Files in archive:");
            for member in archive.members() {
                println!("  {}", member.name());
                tracing::debug!(
                    name = member.name(),
                    size = member.size(),
                    mode = ?member.mode(),
                    dir = member.is_dir(),
                    "Archive member"
                );
            }

            let member = archive
                .resolve(&tool.executable)
                .at(InstallStep::ResolveExecutable)?;
            if member.name() != tool.executable {
                tracing::debug!(
                    link = %tool.executable,
                    target = member.name(),
                    "Executable is a link"
                );
            }

            println!("Extracting {} to {}", tool.executable, dest.display());
            write_executable(&mut archive, &tool.executable, &dest)?;
        }

        drop(temp_dir);
        tracing::info!(tool = %tool.name, path = %dest.display(), "Installed");
        Ok(dest)
    }

    /// Maps an executable member path to its place below the bin directory.
    ///
    /// The member path is kept as-is, so `bin/tool` installs to
    /// `<bin_dir>/bin/tool`. Paths that would leave the bin directory are
    /// refused.
    fn destination(&self, executable: &str) -> Result<PathBuf, ToolupError> {
        let relative = Path::new(executable);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        let has_file = relative
            .components()
            .any(|c| matches!(c, Component::Normal(_)));

        let dest = self.bin_dir.join(relative);
        if escapes || !has_file {
            return Err(ToolupError::write_error(
                dest,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("executable path `{executable}` does not name a file inside the bin directory"),
                ),
            ));
        }
        Ok(dest)
    }

    fn temp_dir(&self) -> Result<tempfile::TempDir, ToolupError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("toolup-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|e| ToolupError::io_error("failed to create temporary directory", e))
    }
}

/// Streams `name` from `archive` into `dest`.
///
/// The data is staged in a temporary file next to `dest` and renamed over it
/// once complete.
fn write_executable<R: Read + io::Seek>(
    archive: &mut ArchiveReader<R>,
    name: &str,
    dest: &Path,
) -> StepResult<()> {
    let mut reader = archive.open(name).at(InstallStep::OpenArchive)?;

    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .map_err(|e| ToolupError::write_error(parent, e))
        .at(InstallStep::Write)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".toolup-")
        .tempfile_in(parent)
        .map_err(|e| ToolupError::write_error(dest, e))
        .at(InstallStep::Write)?;

    let mut buf = vec![0u8; COPY_CHUNK_LEN];
    let mut written: u64 = 0;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err((InstallStep::Write, ArchiveError::Io(e).into())),
        };
        staged
            .write_all(&buf[..n])
            .map_err(|e| ToolupError::write_error(dest, e))
            .at(InstallStep::Write)?;
        written += n as u64;
    }
    drop(reader);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(EXECUTABLE_MODE))
            .map_err(|e| {
                ToolupError::io_error(format!("failed to set permissions on {}", dest.display()), e)
            })
            .at(InstallStep::SetPermissions)?;
    }

    staged
        .persist(dest)
        .map_err(|e| ToolupError::write_error(dest, e.error))
        .at(InstallStep::Write)?;

    tracing::debug!(path = %dest.display(), bytes = written, "Wrote executable");
    Ok(())
}

/// Joins an error and its sources into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
