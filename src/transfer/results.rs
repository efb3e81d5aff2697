//! Transfer result types
//!
//! Defines result structures returned by transfer operations.

use std::path::PathBuf;

use crate::archive::{ExtractReport, PayloadKind};
use crate::transfer::modes::UploadMode;

/// Result of a completed upload
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// Target directory for archives, the written file otherwise.
    pub final_path: PathBuf,
    /// Virtual path of `final_path`.
    pub display_path: String,
    pub kind: PayloadKind,
    pub mode: UploadMode,
    /// Extraction summary, for tar payloads only.
    pub report: Option<ExtractReport>,
}
