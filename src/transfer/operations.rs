//! Transfer operations
//!
//! Orchestrates an upload: resolves the target directory, prepares it for the
//! requested mode, then hands the payload to the matching writer.

use log::{error, info};
use std::io::{self, Read};
use std::path::Path;

use crate::archive::{self, PayloadKind};
use crate::error::{ServiceError, TransferError};
use crate::storage::filesystem::{clear_directory, create_directory, remove_directory};
use crate::storage::results::ResolvedPath;
use crate::storage::validation::validate_filename;
use crate::storage::{PathResolver, relative_to};
use crate::transfer::file_ops::store_plain_file;
use crate::transfer::modes::UploadMode;
use crate::transfer::results::UploadResult;

/// An upload as requested by a client
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Target directory, relative to the prefix or absolute within it.
    pub destination: &'a str,
    /// Client-supplied file name; its suffix selects how the payload is stored.
    pub file_name: &'a str,
    pub mode: UploadMode,
}

/// Stores an upload stream according to its file name.
///
/// Archives are extracted into the target directory and the directory is
/// returned; other payloads return the path of the written file. Nothing on
/// disk is touched until both the destination and the file name have been
/// validated.
pub fn upload<R: Read>(
    resolver: &PathResolver,
    request: &UploadRequest<'_>,
    reader: R,
) -> Result<UploadResult, ServiceError> {
    let target = resolver.resolve_upload_target(request.destination)?;
    let file_name = validate_filename(request.file_name)?;
    let kind = PayloadKind::classify(request.file_name);

    prepare_target(&target, request.mode)?;

    let (final_path, report) = match kind {
        PayloadKind::TarGz => {
            let decoder = archive::gzip_decoder(reader, request.file_name)?;
            let report = archive::extract_tar(decoder, &target.real, request.file_name)?;
            (target.real.clone(), Some(report))
        }
        PayloadKind::Tar => {
            let report = archive::extract_tar(reader, &target.real, request.file_name)?;
            (target.real.clone(), Some(report))
        }
        PayloadKind::Gzip => {
            let path = archive::decompress_to_file(reader, &target.real, &file_name)?;
            (path, None)
        }
        PayloadKind::Plain => (store_plain_file(reader, &target.real, &file_name)?, None),
    };

    match &report {
        Some(report) => info!(
            "Upload of {} ({}, {}) into {} complete: {} files, {} dirs, {} skipped, {} bytes",
            request.file_name,
            kind.as_str(),
            request.mode.as_str(),
            target.display,
            report.files,
            report.directories,
            report.skipped,
            report.bytes
        ),
        None => info!(
            "Upload of {} ({}, {}) into {} complete: {}",
            request.file_name,
            kind.as_str(),
            request.mode.as_str(),
            target.display,
            final_path.display()
        ),
    }

    Ok(UploadResult {
        display_path: virtual_path(&target.base, &final_path),
        final_path,
        kind,
        mode: request.mode,
        report,
    })
}

/// Client-visible path of `path`, which lies within `base`.
fn virtual_path(base: &Path, path: &Path) -> String {
    let relative = relative_to(base, path);
    if relative == Path::new(".") {
        "/".to_string()
    } else {
        format!("/{}", relative.to_string_lossy())
    }
}

/// Makes sure the target directory exists, emptying it first in replace mode.
///
/// The prefix root itself is never removed, only cleared.
fn prepare_target(target: &ResolvedPath, mode: UploadMode) -> Result<(), TransferError> {
    let prepare_error = |path: &Path, source: io::Error| {
        error!("Failed to prepare {}: {}", path.display(), source);
        TransferError::Prepare {
            path: path.to_path_buf(),
            source,
        }
    };

    if mode == UploadMode::Replace {
        let cleared = if target.is_root() {
            clear_directory(&target.real)
        } else {
            remove_directory(&target.real)
        };
        cleared.map_err(|e| prepare_error(&target.real, e))?;
    }

    create_directory(&target.real, None).map_err(|e| prepare_error(&target.real, e))
}
