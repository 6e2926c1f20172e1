//! Content sniffing for archive formats.
//!
//! Detection never trusts file names. Each probe reads from the start (tar) or
//! the end (zip) of the source and answers with a plain yes/no; only failures
//! of the source itself are reported as errors.

use std::cell::Cell;
use std::io::{self, Read, Seek, SeekFrom};

use super::tarball::TarCompression;

/// Size of a tar header block.
const TAR_BLOCK_LEN: usize = 512;

/// Byte range of the header checksum field.
const TAR_CHECKSUM_FIELD: std::ops::Range<usize> = 148..156;

/// Signature of the zip end-of-central-directory record.
const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

/// Fixed part of the end-of-central-directory record.
const EOCD_LEN: u64 = 22;

/// The archive comment that may trail the EOCD record is at most this long.
const MAX_COMMENT_LEN: u64 = 0xffff;

/// Reader adapter that remembers whether the wrapped source ever failed.
///
/// Decoders surface both their own errors and the source's errors as
/// `io::Error`; the flag tells the two apart after the fact.
pub(super) struct Tracked<'a, R> {
    inner: R,
    failed: &'a Cell<bool>,
}

impl<'a, R> Tracked<'a, R> {
    pub(super) fn new(inner: R, failed: &'a Cell<bool>) -> Self {
        Self { inner, failed }
    }
}

impl<R: Read> Read for Tracked<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| self.failed.set(true))
    }
}

/// Checks whether the source holds a (possibly compressed) tar archive.
///
/// Returns the compression layer on a match. The source position is
/// unspecified afterwards.
///
/// # Errors
///
/// Returns an error only if reading or seeking the source itself fails.
pub(super) fn probe_tar<R: Read + Seek>(source: &mut R) -> io::Result<Option<TarCompression>> {
    source.rewind()?;
    let mut magic = [0u8; TarCompression::MAGIC_LEN];
    let magic_len = read_up_to(source, &mut magic)?;
    let compression = TarCompression::sniff(&magic[..magic_len]);

    source.rewind()?;
    let source_failed = Cell::new(false);
    let mut block = [0u8; TAR_BLOCK_LEN];
    let read = {
        let mut reader = compression.decoder(Tracked::new(&mut *source, &source_failed))?;
        read_up_to(&mut reader, &mut block)
    };

    let matched = match read {
        Err(err) if source_failed.get() => return Err(err),
        Err(err) => {
            tracing::debug!(%compression, error = %err, "Tar probe could not decode stream");
            false
        }
        Ok(len) => len == TAR_BLOCK_LEN && is_tar_header(&block),
    };

    tracing::debug!(%compression, matched, "Probed for tar archive");
    Ok(matched.then_some(compression))
}

/// Checks whether the source ends with a zip end-of-central-directory record.
///
/// # Errors
///
/// Returns an error only if reading or seeking the source itself fails.
pub(super) fn probe_zip<R: Read + Seek>(source: &mut R) -> io::Result<bool> {
    let len = source.seek(SeekFrom::End(0))?;
    if len < EOCD_LEN {
        tracing::debug!(len, "Source too short for a zip archive");
        return Ok(false);
    }

    let window = len.min(EOCD_LEN + MAX_COMMENT_LEN);
    source.seek(SeekFrom::Start(len - window))?;
    let mut tail = Vec::with_capacity(usize::try_from(window).unwrap_or(usize::MAX));
    (&mut *source).take(window).read_to_end(&mut tail)?;

    let matched = find_eocd(&tail).is_some();
    tracing::debug!(matched, "Probed for zip archive");
    Ok(matched)
}

/// Validates a tar header block by its checksum.
///
/// An all-zero block is the end-of-archive marker, which is what an empty
/// tarball starts with. Both the unsigned and the historic signed checksum
/// are accepted.
fn is_tar_header(block: &[u8; TAR_BLOCK_LEN]) -> bool {
    if block.iter().all(|&b| b == 0) {
        return true;
    }

    let Some(recorded) = parse_octal(&block[TAR_CHECKSUM_FIELD]) else {
        return false;
    };

    let mut unsigned: u64 = 0;
    let mut signed: i64 = 0;
    for (i, &byte) in block.iter().enumerate() {
        let byte = if TAR_CHECKSUM_FIELD.contains(&i) { b' ' } else { byte };
        unsigned += u64::from(byte);
        signed += i64::from(byte.cast_signed());
    }

    recorded == unsigned || i64::try_from(recorded).is_ok_and(|r| r == signed)
}

/// Parses a NUL/space padded octal header field.
fn parse_octal(field: &[u8]) -> Option<u64> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = std::str::from_utf8(&field[..end]).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    u64::from_str_radix(text, 8).ok()
}

/// Finds the last EOCD signature with a complete fixed-size record after it.
fn find_eocd(tail: &[u8]) -> Option<usize> {
    let record_len = usize::try_from(EOCD_LEN).ok()?;
    if tail.len() < record_len {
        return None;
    }
    (0..=tail.len() - record_len)
        .rev()
        .find(|&i| tail[i..i + EOCD_SIGNATURE.len()] == EOCD_SIGNATURE)
}

/// Reads until `buf` is full or the reader is exhausted.
fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tar_with_file(name: &str, data: &[u8]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, data)
            .expect("Should append file");
        builder.into_inner().expect("Should finish tar")
    }

    #[test]
    fn tar_header_checksum_is_validated() {
        let bytes = tar_with_file("bin/tool", b"binary content");
        let mut block = [0u8; TAR_BLOCK_LEN];
        block.copy_from_slice(&bytes[..TAR_BLOCK_LEN]);
        assert!(is_tar_header(&block));

        block[0] ^= 0x01;
        assert!(!is_tar_header(&block), "corrupted name must break the checksum");
    }

    #[test]
    fn zero_block_counts_as_empty_tar() {
        assert!(is_tar_header(&[0u8; TAR_BLOCK_LEN]));
    }

    #[test]
    fn header_without_checksum_digits_is_rejected() {
        let mut block = [b'x'; TAR_BLOCK_LEN];
        block[TAR_CHECKSUM_FIELD].copy_from_slice(b"        ");
        assert!(!is_tar_header(&block));
    }

    #[test]
    fn parse_octal_handles_padding() {
        assert_eq!(parse_octal(b"0012345\0"), Some(0o12345));
        assert_eq!(parse_octal(b" 12345 \0"), Some(0o12345));
        assert_eq!(parse_octal(b"\0\0\0\0\0\0\0\0"), None);
        assert_eq!(parse_octal(b"   9    "), None);
    }

    #[test]
    fn probe_tar_accepts_plain_tar() {
        let mut source = Cursor::new(tar_with_file("bin/tool", b"abc"));
        let found = probe_tar(&mut source).expect("Probe should not fail");
        assert_eq!(found, Some(TarCompression::None));
    }

    #[test]
    fn probe_tar_accepts_gzip_tar() {
        use flate2::{Compression, write::GzEncoder};
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&tar_with_file("bin/tool", b"abc"))
            .expect("Should compress");
        let mut source = Cursor::new(encoder.finish().expect("Should finish gzip"));

        let found = probe_tar(&mut source).expect("Probe should not fail");
        assert_eq!(found, Some(TarCompression::Gzip));
    }

    #[test]
    fn probe_tar_rejects_gzip_of_non_tar() {
        use flate2::{Compression, write::GzEncoder};
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&[b'z'; 2048])
            .expect("Should compress");
        let mut source = Cursor::new(encoder.finish().expect("Should finish gzip"));

        assert_eq!(probe_tar(&mut source).expect("Probe should not fail"), None);
    }

    #[test]
    fn probe_tar_rejects_truncated_gzip() {
        let mut source = Cursor::new(vec![0x1f, 0x8b, 0x08, 0x00, 0x01]);
        assert_eq!(probe_tar(&mut source).expect("Probe should not fail"), None);
    }

    #[test]
    fn probe_tar_rejects_short_input() {
        let mut source = Cursor::new(b"tiny".to_vec());
        assert_eq!(probe_tar(&mut source).expect("Probe should not fail"), None);
    }

    #[test]
    fn probe_zip_finds_eocd_after_comment() {
        let mut bytes = vec![0u8; 100];
        bytes.extend_from_slice(&EOCD_SIGNATURE);
        bytes.extend_from_slice(&[0u8; 18]);
        bytes.extend_from_slice(b"trailing archive comment");
        let mut source = Cursor::new(bytes);
        assert!(probe_zip(&mut source).expect("Probe should not fail"));
    }

    #[test]
    fn probe_zip_requires_complete_record() {
        let mut bytes = vec![0u8; 100];
        bytes.extend_from_slice(&EOCD_SIGNATURE);
        bytes.extend_from_slice(&[0u8; 10]);
        let mut source = Cursor::new(bytes);
        assert!(!probe_zip(&mut source).expect("Probe should not fail"));
    }

    #[test]
    fn probe_zip_rejects_short_input() {
        let mut source = Cursor::new(EOCD_SIGNATURE.to_vec());
        assert!(!probe_zip(&mut source).expect("Probe should not fail"));
    }

    #[test]
    fn source_failures_propagate() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            }
        }

        impl Seek for Broken {
            fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
                Ok(0)
            }
        }

        let err = probe_tar(&mut Broken).expect_err("Source failure should propagate");
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
