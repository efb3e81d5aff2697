//! Upload modes
//!
//! Decides what happens to an existing target directory before a payload is
//! written into it.

/// Upload modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Write into the target directory, keeping whatever is already there
    Merge,
    /// Empty the target directory before writing
    Replace,
}

impl UploadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadMode::Merge => "merge",
            UploadMode::Replace => "replace",
        }
    }
}
