//! Plain file uploads
//!
//! Copies an upload stream into the target directory. Data goes to a
//! temporary file next to the destination, which is renamed into place once
//! the stream has been fully written, so readers never see a half-written
//! file under the final name.

use log::{debug, error, info};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::TransferError;
use crate::storage::filesystem::{
    self, CopyError, DEFAULT_FILE_MODE, create_directory, create_file,
};
use crate::storage::join_within;

const TEMP_SUFFIX: &str = ".upload";

/// Stores `reader` as `file_name` below `target_dir`, returning the final path.
pub fn store_plain_file<R: Read>(
    mut reader: R,
    target_dir: &Path,
    file_name: &Path,
) -> Result<PathBuf, TransferError> {
    let name = file_name.display().to_string();
    let dest = join_within(target_dir, file_name)
        .filter(|dest| dest != target_dir)
        .ok_or_else(|| TransferError::OutsideTarget(name.clone()))?;

    if let Some(parent) = dest.parent() {
        create_directory(parent, None).map_err(|source| TransferError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp = temp_path(&dest);
    debug!("Receiving {} via {}", name, temp.display());

    let mut file = create_file(&temp, DEFAULT_FILE_MODE).map_err(|source| TransferError::Write {
        path: temp.clone(),
        source,
    })?;

    let bytes = match filesystem::copy_stream(&mut reader, &mut file) {
        Ok(bytes) => bytes,
        Err(e) => {
            drop(file);
            filesystem::discard_partial(&temp);
            return Err(match e {
                CopyError::Read(source) => TransferError::Stream { name, source },
                CopyError::Write(source) => {
                    error!("Failed to write {}: {}", temp.display(), source);
                    TransferError::Write { path: temp, source }
                }
            });
        }
    };
    drop(file);

    if let Err(source) = fs::rename(&temp, &dest) {
        error!("Failed to rename {} to {}: {}", temp.display(), dest.display(), source);
        filesystem::discard_partial(&temp);
        return Err(TransferError::Write { path: dest, source });
    }

    info!("Stored {} ({} bytes)", dest.display(), bytes);
    Ok(dest)
}

fn temp_path(dest: &Path) -> PathBuf {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{file_name}{TEMP_SUFFIX}"))
}
