//! Tar extraction
//!
//! Streams a tar archive into a target directory. Every entry name is checked
//! twice: once on its own, and again after it has been joined onto the target.

use log::{debug, info};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Entry, EntryType};

use crate::error::ArchiveError;
use crate::storage::filesystem::{
    self, CopyError, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, create_directory, create_file,
};
use crate::storage::{clean_path, is_within};

/// Permission bits kept from an entry header; setuid and setgid are dropped.
const MODE_MASK: u32 = 0o1777;

/// Summary of a completed extraction
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    /// Entries of unsupported types (links, devices, fifos, ...)
    pub skipped: usize,
    pub bytes: u64,
}

impl ExtractReport {
    pub fn entries(&self) -> usize {
        self.files + self.directories + self.skipped
    }
}

/// Extracts a tar stream into `target_dir`.
///
/// The first unsafe entry name aborts the extraction. Entries written before
/// a failure are left in place.
pub fn extract_tar<R: Read>(
    reader: R,
    target_dir: &Path,
    archive_name: &str,
) -> Result<ExtractReport, ArchiveError> {
    let corrupt = |source| ArchiveError::Corrupt {
        archive: archive_name.to_string(),
        source,
    };

    let mut archive = Archive::new(reader);
    let mut report = ExtractReport::default();

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;

        let name = entry.path().map_err(corrupt)?.into_owned();
        let dest = entry_destination(target_dir, &name).ok_or_else(|| {
            ArchiveError::UnsafeEntry {
                archive: archive_name.to_string(),
                entry: name.display().to_string(),
            }
        })?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                let mode = entry.header().mode().unwrap_or(DEFAULT_DIR_MODE) & MODE_MASK;
                debug!("Creating directory {}", dest.display());
                create_directory(&dest, Some(mode)).map_err(|source| ArchiveError::Io {
                    path: dest.clone(),
                    source,
                })?;
                report.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous => {
                let written = extract_file(&mut entry, &dest, &name, archive_name)?;
                report.files += 1;
                report.bytes += written;
            }
            other => {
                debug!(
                    "Skipping unsupported entry '{}' ({:?}) in {}",
                    name.display(),
                    other,
                    archive_name
                );
                report.skipped += 1;
            }
        }
    }

    if report.entries() == 0 {
        return Err(ArchiveError::Empty(archive_name.to_string()));
    }

    info!(
        "Extracted {} into {}: {} files, {} directories, {} skipped, {} bytes",
        archive_name,
        target_dir.display(),
        report.files,
        report.directories,
        report.skipped,
        report.bytes
    );
    Ok(report)
}

/// Where an entry lands inside `target_dir`, or `None` if the name is unsafe.
fn entry_destination(target_dir: &Path, name: &Path) -> Option<PathBuf> {
    let cleaned = clean_path(name);
    let unsafe_name = matches!(cleaned.components().next(), Some(Component::ParentDir))
        || cleaned
            .components()
            .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)));
    if unsafe_name {
        return None;
    }

    let dest = clean_path(&target_dir.join(&cleaned));
    is_within(target_dir, &dest).then_some(dest)
}

fn extract_file<R: Read>(
    entry: &mut Entry<'_, R>,
    dest: &Path,
    name: &Path,
    archive_name: &str,
) -> Result<u64, ArchiveError> {
    let io_error = |source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    };

    if let Some(parent) = dest.parent() {
        create_directory(parent, None).map_err(io_error)?;
    }

    let mode = entry.header().mode().unwrap_or(DEFAULT_FILE_MODE) & MODE_MASK;
    let expected = entry.size();
    debug!("Writing {} ({} bytes)", dest.display(), expected);

    let mut file = create_file(dest, mode).map_err(io_error)?;
    if expected == 0 {
        return Ok(0);
    }

    let result = match filesystem::copy_stream(entry, &mut file) {
        Ok(actual) if actual == expected => Ok(actual),
        Ok(actual) => Err(ArchiveError::Truncated {
            archive: archive_name.to_string(),
            entry: name.display().to_string(),
            expected,
            actual,
        }),
        Err(CopyError::Read(source)) => Err(ArchiveError::Corrupt {
            archive: archive_name.to_string(),
            source,
        }),
        Err(CopyError::Write(source)) => Err(io_error(source)),
    };

    if result.is_err() {
        drop(file);
        filesystem::discard_partial(dest);
    }
    result
}
