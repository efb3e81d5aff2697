//! Storage operations
//!
//! Directory listing and size formatting for the listing endpoint.

use log::{debug, error, warn};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::ListError;
use crate::storage::results::{DirectoryEntry, EntryKind, ListResult};

const SIZE_UNITS: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Lists the immediate children of a directory
///
/// `real_path` is the resolved filesystem location and `display_path` the
/// virtual path the client asked for. Children are sorted by name. Symlinks
/// are reported as their target; a link whose target cannot be read is left
/// out.
pub fn list_directory(real_path: &Path, display_path: &str) -> Result<ListResult, ListError> {
    let read_error = |e: io::Error| match e.kind() {
        io::ErrorKind::NotFound => ListError::NotFound(display_path.to_string()),
        io::ErrorKind::PermissionDenied => ListError::PermissionDenied(display_path.to_string()),
        _ => {
            error!(
                "Failed to list directory {} (real: {}): {}",
                display_path,
                real_path.display(),
                e
            );
            ListError::Io {
                path: display_path.to_string(),
                source: e,
            }
        }
    };

    let metadata = fs::metadata(real_path).map_err(read_error)?;
    if !metadata.is_dir() {
        return Err(ListError::NotADirectory(display_path.to_string()));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(real_path).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let name = entry.file_name().to_string_lossy().into_owned();

        // fs::metadata follows symlinks
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping unreadable entry {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let (kind, size) = if metadata.is_dir() {
            (EntryKind::Directory, String::new())
        } else {
            (EntryKind::File, format_file_size(metadata.len()))
        };

        entries.push(DirectoryEntry {
            link: child_link(display_path, &name),
            name,
            kind,
            size,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    debug!("Listed {} entries in {}", entries.len(), display_path);

    Ok(ListResult {
        path: display_path.to_string(),
        entries,
        parent_link: parent_link(display_path),
    })
}

/// Formats a byte count with binary units, e.g. `512 B` or `1.5 KiB`
pub fn format_file_size(size: u64) -> String {
    const UNIT: u64 = 1024;
    if size < UNIT {
        return format!("{} B", size);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = size / UNIT;
    while n >= UNIT && exp + 1 < SIZE_UNITS.len() {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}iB", size as f64 / div as f64, SIZE_UNITS[exp])
}

fn child_link(display_path: &str, name: &str) -> String {
    let dir = display_path.trim_end_matches('/');
    format!("{}/{}", dir, name)
}

fn parent_link(display_path: &str) -> Option<String> {
    let trimmed = display_path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) | None => Some("/".to_string()),
        Some(i) => Some(trimmed[..i].to_string()),
    }
}
