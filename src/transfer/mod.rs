//! Transfer module
//!
//! Stores uploaded payloads: plain files are copied, gzip files decompressed
//! and tar archives extracted into a resolved target directory.

pub mod file_ops;
pub mod modes;
pub mod operations;
pub mod results;

pub use file_ops::store_plain_file;
pub use modes::UploadMode;
pub use operations::{UploadRequest, upload};
pub use results::UploadResult;
