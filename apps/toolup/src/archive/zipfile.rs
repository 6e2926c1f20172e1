//! Zip-backed archive access.

use std::io::{Read, Seek};

use zip::ZipArchive;
use zip::result::ZipError;

use super::{ArchiveError, ArchiveKind, ArchiveMember};

pub(super) struct ZipBackend<R> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> ZipBackend<R> {
    /// Reads the central directory and lists every entry in directory order.
    ///
    /// Zip members never carry a mode: the unix permission bits only exist in
    /// the optional "external attributes" and are not used here.
    pub(super) fn index(source: R) -> Result<(Self, Vec<ArchiveMember>), ArchiveError> {
        let mut archive = ZipArchive::new(source).map_err(zip_error)?;

        let mut members = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(zip_error)?;
            members.push(ArchiveMember::new(
                entry.name().to_owned(),
                entry.size(),
                None,
                entry.is_dir(),
            ));
        }

        tracing::debug!(members = members.len(), "Indexed zip archive");
        Ok((Self { archive }, members))
    }

    /// Returns a decompressing reader for the entry at `index`.
    pub(super) fn open(&mut self, index: usize) -> Result<Box<dyn Read + '_>, ArchiveError> {
        let entry = self.archive.by_index(index).map_err(zip_error)?;
        Ok(Box::new(entry))
    }
}

fn zip_error(err: ZipError) -> ArchiveError {
    match err {
        ZipError::Io(err) => ArchiveError::Io(err),
        other => ArchiveError::Malformed {
            kind: ArchiveKind::Zip,
            message: other.to_string(),
        },
    }
}
