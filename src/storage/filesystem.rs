//! File system operations
//!
//! Directory and file primitives shared by archive extraction and plain
//! uploads.

use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

/// Mode for files whose origin carries no permission bits.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Mode for directories created implicitly.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

const BUFFER_SIZE: usize = 8192;

/// Which side of a copy failed.
#[derive(Debug)]
pub enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

/// Create a directory and any missing ancestors.
///
/// `mode` applies to every directory created by this call; existing
/// directories are left untouched.
pub fn create_directory(path: &Path, mode: Option<u32>) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode.unwrap_or(DEFAULT_DIR_MODE));
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

/// Remove a directory tree. A missing directory is not an error.
pub fn remove_directory(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove everything inside a directory but keep the directory itself.
pub fn clear_directory(path: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Open a file for writing, creating or truncating it.
pub fn create_file(path: &Path, mode: u32) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

/// Copy a stream to a writer through a fixed buffer, returning the number of
/// bytes written.
pub fn copy_stream<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
) -> Result<u64, CopyError> {
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        writer.write_all(&buffer[..n]).map_err(CopyError::Write)?;
        total += n as u64;
    }

    writer.flush().map_err(CopyError::Write)?;
    Ok(total)
}

/// Delete a partially written file after a failed copy.
pub fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove partial file {}: {}", path.display(), e);
    }
}
