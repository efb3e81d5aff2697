//! Query-string parameters
//!
//! Missing parameters deserialize to empty strings; the resolver decides
//! whether an empty value is acceptable.

use serde::Deserialize;

/// Parameters of `GET /list`
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Directory to list, relative to the prefix
    #[serde(default)]
    pub d: String,
}

/// Parameters of `POST /` and `PUT /`
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    /// Target directory
    #[serde(default)]
    pub path: String,
    /// Name of the uploaded payload
    #[serde(default)]
    pub filename: String,
}
