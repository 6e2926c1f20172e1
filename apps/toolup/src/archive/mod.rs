//! Format-agnostic read access to release archives.
//!
//! [`ArchiveReader`] wraps a seekable byte source, works out by content alone
//! whether it holds a tarball (plain, gzip, bzip2, xz or zstd compressed) or
//! a zip file, and then offers the same two operations for both: list the
//! members, and stream one member out by exact name.
//!
//! ## Detection order
//!
//! Tar is probed first and zip second. An input that satisfies both probes
//! (for example a tarball whose last member is itself a zip file) is read as
//! a tarball.
//!
//! ## Example
//!
//! ```ignore
//! let mut archive = ArchiveReader::open_path(Path::new("download"))?;
//! for member in archive.members() {
//!     println!("{}", member.name());
//! }
//! std::io::copy(&mut archive.open("bin/tool")?, &mut output)?;
//! ```

mod detect;
mod tarball;
mod zipfile;

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;

use thiserror::Error;

pub use tarball::TarCompression;
use tarball::TarBackend;
use zipfile::ZipBackend;

/// Archive format detected for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Tarball with the given compression layer.
    Tar(TarCompression),
    Zip,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tar(compression) => fmt::Display::fmt(compression, f),
            Self::Zip => f.write_str("zip"),
        }
    }
}

/// One entry of an opened archive.
///
/// The same type describes tar and zip entries. Only tar entries carry a
/// permission mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    name: String,
    size: u64,
    mode: Option<u32>,
    is_dir: bool,
}

impl ArchiveMember {
    pub(crate) fn new(name: String, size: u64, mode: Option<u32>, is_dir: bool) -> Self {
        Self {
            name,
            size,
            mode,
            is_dir,
        }
    }

    /// Member name as recorded in the archive. Tar directory names are
    /// stored without their trailing slash; zip directory names keep it.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared uncompressed size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// POSIX permission bits, `None` for zip members.
    #[must_use]
    pub fn mode(&self) -> Option<u32> {
        self.mode
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// Errors raised by [`ArchiveReader`].
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The source is neither a tarball nor a zip file.
    #[error("not a recognized archive type")]
    UnrecognizedFormat,

    /// No member carries the requested name.
    #[error("member not found in archive: {name}")]
    MemberNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// The member exists but holds no readable data, such as a directory.
    #[error("archive member is not a regular file: {name}")]
    NotAFile {
        /// Name of the offending member.
        name: String,
    },

    /// A link member could not be followed to a regular file.
    #[error("cannot follow link {name} -> {target}: {reason}")]
    UnresolvedLink {
        /// Name of the link member.
        name: String,
        /// Target recorded in the link.
        target: String,
        reason: &'static str,
    },

    /// The format signature matched but the archive structure is broken.
    #[error("malformed {kind} archive: {message}")]
    Malformed {
        /// Format the source was detected as.
        kind: ArchiveKind,
        /// Description from the format parser.
        message: String,
    },

    /// The underlying byte source failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// Creates a new `MemberNotFound` error.
    #[must_use]
    pub fn member_not_found(name: impl Into<String>) -> Self {
        Self::MemberNotFound { name: name.into() }
    }

    #[must_use]
    pub fn not_a_file(name: impl Into<String>) -> Self {
        Self::NotAFile { name: name.into() }
    }

    #[must_use]
    pub fn unresolved_link(
        name: impl Into<String>,
        target: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::UnresolvedLink {
            name: name.into(),
            target: target.into(),
            reason,
        }
    }
}

enum Backend<R> {
    Tar(TarBackend<R>),
    Zip(ZipBackend<R>),
}

/// Read-only view over a tar or zip archive.
///
/// The reader owns its byte source for its whole lifetime and releases it
/// exactly once, when dropped. The format is fixed at construction.
pub struct ArchiveReader<R> {
    kind: ArchiveKind,
    backend: Backend<R>,
    members: Vec<ArchiveMember>,
}

impl ArchiveReader<BufReader<File>> {
    /// Opens the archive stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or for any reason
    /// listed on [`ArchiveReader::new`].
    pub fn open_path(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Detects the archive format of `source` and indexes its members.
    ///
    /// The source is rewound before every probe, so it does not need to be
    /// positioned at the start. On failure the source is dropped; pass a
    /// `&mut` reference to keep ownership of it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Neither a tar nor a zip signature matches ([`ArchiveError::UnrecognizedFormat`])
    /// - A signature matches but the archive cannot be parsed ([`ArchiveError::Malformed`])
    /// - The source fails to read or seek ([`ArchiveError::Io`])
    pub fn new(mut source: R) -> Result<Self, ArchiveError> {
        source.rewind()?;

        if let Some(compression) = detect::probe_tar(&mut source)? {
            let (backend, members) = TarBackend::index(source, compression)?;
            return Ok(Self {
                kind: ArchiveKind::Tar(compression),
                backend: Backend::Tar(backend),
                members,
            });
        }

        source.rewind()?;
        if detect::probe_zip(&mut source)? {
            source.rewind()?;
            let (backend, members) = ZipBackend::index(source)?;
            return Ok(Self {
                kind: ArchiveKind::Zip,
                backend: Backend::Zip(backend),
                members,
            });
        }

        Err(ArchiveError::UnrecognizedFormat)
    }

    /// The detected archive format.
    #[must_use]
    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// All members in the archive's own order.
    ///
    /// The list is built once when the archive is opened, so calling this
    /// repeatedly is cheap and always returns the same entries.
    #[must_use]
    pub fn members(&self) -> &[ArchiveMember] {
        &self.members
    }

    /// Looks up a member by exact name. The first match wins when an archive
    /// contains the same name more than once.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MemberNotFound`] if no member has that name.
    #[allow(dead_code)]
    pub fn member(&self, name: &str) -> Result<&ArchiveMember, ArchiveError> {
        self.position(name).map(|index| &self.members[index])
    }

    /// Looks up `name` and follows tar links to the member whose data
    /// [`ArchiveReader::open`] would return.
    ///
    /// Nothing is read from the source.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MemberNotFound`] if no member has that name,
    /// [`ArchiveError::NotAFile`] if it leads to a directory or other entry
    /// without data, and [`ArchiveError::UnresolvedLink`] for a dangling or
    /// looping link.
    pub fn resolve(&self, name: &str) -> Result<&ArchiveMember, ArchiveError> {
        self.resolve_index(name).map(|index| &self.members[index])
    }

    /// Streams the content of the member called `name`, following links.
    ///
    /// The stream borrows the reader and therefore cannot outlive it. Its
    /// length is not checked against the declared [`ArchiveMember::size`].
    ///
    /// # Errors
    ///
    /// Returns any error listed on [`ArchiveReader::resolve`], or an error if
    /// the source cannot be repositioned or decoded.
    pub fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>, ArchiveError> {
        let index = self.resolve_index(name)?;
        tracing::debug!(name, index, kind = %self.kind, "Opening archive member");

        match &mut self.backend {
            Backend::Tar(tar) => tar.open(index, self.members[index].size),
            Backend::Zip(zip) => zip.open(index),
        }
    }

    fn resolve_index(&self, name: &str) -> Result<usize, ArchiveError> {
        let index = self.position(name)?;
        let index = match &self.backend {
            Backend::Tar(tar) => tar.resolve(index, &self.members)?,
            Backend::Zip(_) => index,
        };
        if self.members[index].is_dir {
            return Err(ArchiveError::not_a_file(name));
        }
        Ok(index)
    }

    fn position(&self, name: &str) -> Result<usize, ArchiveError> {
        self.members
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| ArchiveError::member_not_found(name))
    }
}

impl<R> fmt::Debug for ArchiveReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("kind", &self.kind)
            .field("members", &self.members.len())
            .finish_non_exhaustive()
    }
}
