//! Gzip decompression
//!
//! Validates the gzip magic up front so a malformed stream fails with a
//! header error rather than surfacing later as a tar or copy failure.

use flate2::read::MultiGzDecoder;
use log::{debug, info};
use std::io::{self, Chain, Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::ArchiveError;
use crate::storage::filesystem::{
    self, CopyError, DEFAULT_FILE_MODE, create_directory, create_file,
};
use crate::storage::join_within;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_SUFFIX: &str = ".gz";
/// Output name used when stripping the suffix leaves nothing.
const FALLBACK_NAME: &str = "gzipped_file";

pub type GzipReader<R> = MultiGzDecoder<Chain<Cursor<[u8; 2]>, R>>;

/// Wraps `reader` in a gzip decoder after checking the magic bytes.
pub fn gzip_decoder<R: Read>(mut reader: R, name: &str) -> Result<GzipReader<R>, ArchiveError> {
    let mut magic = [0u8; 2];
    match reader.read_exact(&mut magic) {
        Ok(()) if magic == GZIP_MAGIC => {}
        Ok(()) => return Err(ArchiveError::GzipHeader(name.to_string())),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ArchiveError::GzipHeader(name.to_string()));
        }
        Err(source) => {
            return Err(ArchiveError::Corrupt {
                archive: name.to_string(),
                source,
            });
        }
    }

    Ok(MultiGzDecoder::new(Cursor::new(magic).chain(reader)))
}

/// Name of the decompressed file: `file_name` without its `.gz` suffix.
pub fn decompressed_name(file_name: &Path) -> PathBuf {
    let name = file_name.to_string_lossy();
    let stem = if name.to_ascii_lowercase().ends_with(GZIP_SUFFIX) {
        &name[..name.len() - GZIP_SUFFIX.len()]
    } else {
        &name[..]
    };

    if stem.is_empty() || stem.ends_with('/') {
        PathBuf::from(format!("{stem}{FALLBACK_NAME}"))
    } else {
        PathBuf::from(stem)
    }
}

/// Decompresses a single gzip file into `target_dir`, returning the path of
/// the written file.
pub fn decompress_to_file<R: Read>(
    reader: R,
    target_dir: &Path,
    file_name: &Path,
) -> Result<PathBuf, ArchiveError> {
    let display_name = file_name.display().to_string();
    let output_name = decompressed_name(file_name);
    let dest = join_within(target_dir, &output_name).ok_or_else(|| ArchiveError::UnsafeEntry {
        archive: display_name.clone(),
        entry: output_name.display().to_string(),
    })?;

    let mut decoder = gzip_decoder(reader, &display_name)?;

    let io_error = |source| ArchiveError::Io {
        path: dest.clone(),
        source,
    };
    if let Some(parent) = dest.parent() {
        create_directory(parent, None).map_err(io_error)?;
    }
    let mut file = create_file(&dest, DEFAULT_FILE_MODE).map_err(io_error)?;

    debug!("Decompressing {} to {}", display_name, dest.display());
    match filesystem::copy_stream(&mut decoder, &mut file) {
        Ok(bytes) => {
            info!("Decompressed {} ({} bytes) to {}", display_name, bytes, dest.display());
            Ok(dest)
        }
        Err(e) => {
            drop(file);
            filesystem::discard_partial(&dest);
            Err(match e {
                CopyError::Read(source) => ArchiveError::Corrupt {
                    archive: display_name,
                    source,
                },
                CopyError::Write(source) => io_error(source),
            })
        }
    }
}
