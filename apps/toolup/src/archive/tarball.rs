//! Tar-backed archive access.
//!
//! Tar is a sequential format, so the member list is built by scanning the
//! (decompressed) stream once at open time. For each entry the offset of its
//! data inside the decompressed stream is remembered; opening a member later
//! seeks straight to it for plain tarballs, or replays the decoder from the
//! start and skips ahead for compressed ones.
//!
//! Link members carry no data of their own. They are followed, by name, to
//! the member they point at: symlink targets are relative to the link's own
//! directory, hardlink targets are relative to the archive root.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use super::detect::Tracked;
use super::{ArchiveError, ArchiveKind, ArchiveMember};

/// Compression layer wrapped around a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCompression {
    /// Plain, uncompressed tar.
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl TarCompression {
    /// Longest magic number we need to look at.
    pub(super) const MAGIC_LEN: usize = 6;

    /// Picks the compression from the leading bytes of a stream.
    ///
    /// Anything without a known compression magic is treated as a plain tar;
    /// the header check that follows decides whether it really is one.
    pub(super) fn sniff(magic: &[u8]) -> Self {
        if magic.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if magic.starts_with(b"BZh") {
            Self::Bzip2
        } else if magic.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Self::Xz
        } else if magic.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Wraps `reader` in the matching decoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the zstd decoder context cannot be created.
    pub(super) fn decoder<'a, R: Read + 'a>(self, reader: R) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::None => Box::new(reader),
            Self::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
            Self::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
            Self::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
            Self::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl fmt::Display for TarCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "tar",
            Self::Gzip => "tar.gz",
            Self::Bzip2 => "tar.bz2",
            Self::Xz => "tar.xz",
            Self::Zstd => "tar.zst",
        };
        f.write_str(name)
    }
}

/// Maximum number of links followed when resolving a member.
const MAX_LINK_HOPS: usize = 16;

/// What a tar entry holds.
#[derive(Debug)]
enum Content {
    File,
    Symlink(String),
    Hardlink(String),
    /// Directories, devices, fifos and anything else without readable data.
    Other,
}

#[derive(Debug)]
struct TarEntry {
    data_offset: u64,
    content: Content,
}

/// Open tarball plus the data offset and content kind of every member, in
/// member order.
pub(super) struct TarBackend<R> {
    source: R,
    compression: TarCompression,
    entries: Vec<TarEntry>,
}

impl<R: Read + Seek> TarBackend<R> {
    /// Scans the whole tarball and returns the backend with its member list.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`] if the source fails and
    /// [`ArchiveError::Malformed`] if the tar stream cannot be parsed.
    pub(super) fn index(
        mut source: R,
        compression: TarCompression,
    ) -> Result<(Self, Vec<ArchiveMember>), ArchiveError> {
        source.rewind()?;

        let mut members = Vec::new();
        let mut entries = Vec::new();
        let source_failed = std::cell::Cell::new(false);
        let scan = {
            let tracked = Tracked::new(&mut source, &source_failed);
            let mut archive = tar::Archive::new(compression.decoder(tracked)?);
            scan_entries(&mut archive, &mut members, &mut entries)
        };

        if let Err(err) = scan {
            return Err(if source_failed.get() {
                ArchiveError::Io(err)
            } else {
                ArchiveError::Malformed {
                    kind: ArchiveKind::Tar(compression),
                    message: err.to_string(),
                }
            });
        }

        tracing::debug!(
            %compression,
            members = members.len(),
            "Indexed tar archive"
        );

        Ok((
            Self {
                source,
                compression,
                entries,
            },
            members,
        ))
    }

    /// Follows link members starting at `index` and returns the index of the
    /// regular file they lead to.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::NotAFile`] if the chain ends at a directory or
    /// another entry without data, and [`ArchiveError::UnresolvedLink`] if a
    /// target is missing or the chain is too long.
    pub(super) fn resolve(
        &self,
        mut index: usize,
        members: &[ArchiveMember],
    ) -> Result<usize, ArchiveError> {
        for _ in 0..=MAX_LINK_HOPS {
            let name = members[index].name();
            let (target, path) = match &self.entries[index].content {
                Content::File => return Ok(index),
                Content::Other => return Err(ArchiveError::not_a_file(name)),
                Content::Symlink(target) => (target, symlink_path(name, target)),
                Content::Hardlink(target) => (target, target.clone()),
            };

            let wanted = normalize(&path).ok_or_else(|| {
                ArchiveError::unresolved_link(name, target, "target is outside the archive")
            })?;
            index = members
                .iter()
                .position(|m| normalize(m.name()).as_deref() == Some(wanted.as_str()))
                .ok_or_else(|| {
                    ArchiveError::unresolved_link(name, target, "target is not in the archive")
                })?;
            tracing::debug!(link = name, target = members[index].name(), "Following link");
        }

        let name = members[index].name();
        Err(ArchiveError::unresolved_link(name, name, "too many levels of links"))
    }

    /// Returns a reader over the data of the member at `index`, bounded to `size`.
    ///
    /// `index` must name a regular file, see [`TarBackend::resolve`].
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be repositioned, or if the
    /// decompressed stream ends before the member's data starts.
    pub(super) fn open(
        &mut self,
        index: usize,
        size: u64,
    ) -> Result<Box<dyn Read + '_>, ArchiveError> {
        let offset = self.entries[index].data_offset;

        if self.compression == TarCompression::None {
            self.source.seek(SeekFrom::Start(offset))?;
            return Ok(Box::new((&mut self.source).take(size)));
        }

        self.source.rewind()?;
        let mut reader = self.compression.decoder(&mut self.source)?;
        let skipped = io::copy(&mut (&mut reader).take(offset), &mut io::sink())?;
        if skipped < offset {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("tar stream ended at byte {skipped} before member data at {offset}"),
            )
            .into());
        }

        Ok(Box::new(reader.take(size)))
    }
}

fn scan_entries<T: Read>(
    archive: &mut tar::Archive<T>,
    members: &mut Vec<ArchiveMember>,
    entries: &mut Vec<TarEntry>,
) -> io::Result<()> {
    for entry in archive.entries()? {
        let entry = entry?;
        let header = entry.header();
        let mode = header.mode()?;
        let entry_type = header.entry_type();
        let is_dir = entry_type.is_dir();

        let mut name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if is_dir {
            name = directory_name(name);
        }

        let link_target = || {
            entry
                .link_name_bytes()
                .map(|target| String::from_utf8_lossy(&target).into_owned())
                .unwrap_or_default()
        };
        let content = if entry_type.is_symlink() {
            Content::Symlink(link_target())
        } else if entry_type.is_hard_link() {
            Content::Hardlink(link_target())
        } else if entry_type.is_file() || entry_type.is_contiguous() {
            Content::File
        } else {
            Content::Other
        };

        members.push(ArchiveMember::new(name, entry.size(), Some(mode), is_dir));
        entries.push(TarEntry {
            data_offset: entry.raw_file_position(),
            content,
        });
    }
    Ok(())
}

/// Drops the trailing slashes tar records on directory names.
fn directory_name(name: String) -> String {
    match name.trim_end_matches('/') {
        "" => name,
        trimmed => trimmed.to_owned(),
    }
}

/// Joins a symlink target onto the directory holding the link.
fn symlink_path(link: &str, target: &str) -> String {
    match link.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => format!("{parent}/{target}"),
        _ => target.to_owned(),
    }
}

/// Collapses `.`, `..` and repeated slashes in an archive path.
///
/// Returns `None` for absolute paths and paths that climb above the root.
fn normalize(path: &str) -> Option<String> {
    if path.starts_with('/') {
        return None;
    }
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}
