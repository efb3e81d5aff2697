//! HTTP protocol implementation
//!
//! Handles request parameters, the listing and upload handlers, form
//! uploads, and response formatting.

pub mod handlers;
pub mod multipart;
pub mod params;
pub mod responses;

pub use handlers::{AppState, SharedState, handle_list, handle_upload, healthz};
pub use responses::{ListResponse, UploadResponse, list_link, render_html};
