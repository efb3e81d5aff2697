//! Storage result types
//!
//! Defines result structures returned by storage operations.

use std::path::PathBuf;

/// A client path after resolution against the effective base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute filesystem location, always equal to or below `base`.
    pub real: PathBuf,
    /// Virtual path shown to clients, rooted at `/`.
    pub display: String,
    /// The prefix (or working directory) the request was confined to.
    pub base: PathBuf,
}

impl ResolvedPath {
    pub fn is_root(&self) -> bool {
        self.real == self.base
    }
}

/// Kind of a listed directory child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }
}

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Human readable size, empty for directories.
    pub size: String,
    /// Virtual path of the child.
    pub link: String,
}

/// Result of a directory listing operation
#[derive(Debug, Clone)]
pub struct ListResult {
    pub path: String,
    pub entries: Vec<DirectoryEntry>,
    /// Virtual path of the parent, `None` at the root.
    pub parent_link: Option<String>,
}
