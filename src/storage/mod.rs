//! File system storage management
//!
//! Handles path resolution, directory listing, and the file operations shared
//! by the upload paths.

pub mod filesystem;
pub mod operations;
pub mod results;
pub mod validation;

pub use operations::{format_file_size, list_directory};
pub use results::{DirectoryEntry, EntryKind, ListResult, ResolvedPath};
pub use validation::{PathResolver, clean_path, is_within, join_within, relative_to};
