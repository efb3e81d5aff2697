//! HTTP response bodies
//!
//! JSON shapes for the listing and upload endpoints, the HTML rendering of a
//! listing, and the conversion of service errors into responses.

use axum::Json;
use axum::response::{IntoResponse, Response};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use std::fmt::Write;

use crate::error::handlers::{error_to_status_code, handle_error};
use crate::error::{ErrorKind, ServiceError};
use crate::storage::{DirectoryEntry, EntryKind, ListResult};

/// Characters left unescaped in listing links.
const LINK_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListResponse {
    pub path: String,
    pub entries: Vec<EntryResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<DirectoryEntry> for EntryResponse {
    fn from(entry: DirectoryEntry) -> Self {
        let size = match entry.kind {
            EntryKind::Directory => None,
            EntryKind::File => Some(entry.size),
        };
        Self {
            name: entry.name,
            kind: entry.kind.as_str(),
            size,
            link: list_link(&entry.link),
        }
    }
}

impl From<ListResult> for ListResponse {
    fn from(result: ListResult) -> Self {
        Self {
            path: result.path,
            entries: result.entries.into_iter().map(EntryResponse::from).collect(),
            parent_link: result.parent_link.as_deref().map(list_link),
        }
    }
}

/// Listing URL for a virtual path.
///
/// The leading `/` is dropped so the link stays relative to the prefix.
pub fn list_link(virtual_path: &str) -> String {
    let relative = virtual_path.trim_start_matches('/');
    if relative.is_empty() {
        "/list?d=/".to_string()
    } else {
        format!("/list?d={}", utf8_percent_encode(relative, LINK_ENCODE_SET))
    }
}

/// Renders a listing as a standalone HTML page.
pub fn render_html(listing: &ListResponse) -> String {
    let title = escape_html(&listing.path);
    let mut page = String::new();

    let _ = writeln!(page, "<!DOCTYPE html>\n<html>");
    let _ = writeln!(
        page,
        "<head><meta charset=\"utf-8\"><title>Index of {title}</title></head>"
    );
    let _ = writeln!(page, "<body>\n<h1>Index of {title}</h1>");
    if let Some(parent) = &listing.parent_link {
        let _ = writeln!(page, "<p><a href=\"{}\">..</a></p>", escape_html(parent));
    }

    page.push_str("<table>\n<tr><th>Name</th><th>Type</th><th>Size</th></tr>\n");
    for entry in &listing.entries {
        let _ = writeln!(
            page,
            "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>",
            escape_html(&entry.link),
            escape_html(&entry.name),
            entry.kind,
            escape_html(entry.size.as_deref().unwrap_or("-")),
        );
    }
    page.push_str("</table>\n</body>\n</html>\n");
    page
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        handle_error(&self);
        let status = error_to_status_code(&self);
        let error = match self.kind() {
            ErrorKind::Io => "Internal server error".to_string(),
            _ => self.to_string(),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PathError;
    use axum::http::StatusCode;

    #[test]
    fn test_list_link_encoding() {
        assert_eq!(list_link("/"), "/list?d=/");
        assert_eq!(list_link("/site/docs"), "/list?d=site/docs");
        assert_eq!(list_link("/my files/a&b.txt"), "/list?d=my%20files/a%26b.txt");
    }

    #[test]
    fn test_list_response_shape() {
        let result = ListResult {
            path: "/site".into(),
            entries: vec![
                DirectoryEntry {
                    name: "docs".into(),
                    kind: EntryKind::Directory,
                    size: String::new(),
                    link: "/site/docs".into(),
                },
                DirectoryEntry {
                    name: "index.html".into(),
                    kind: EntryKind::File,
                    size: "12 B".into(),
                    link: "/site/index.html".into(),
                },
            ],
            parent_link: Some("/".into()),
        };

        let json = serde_json::to_value(ListResponse::from(result)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "path": "/site",
                "entries": [
                    {"name": "docs", "type": "directory", "link": "/list?d=site/docs"},
                    {
                        "name": "index.html",
                        "type": "file",
                        "size": "12 B",
                        "link": "/list?d=site/index.html"
                    }
                ],
                "parent_link": "/list?d=/"
            })
        );
    }

    #[test]
    fn test_root_listing_omits_parent_link() {
        let result = ListResult {
            path: "/".into(),
            entries: Vec::new(),
            parent_link: None,
        };
        let json = serde_json::to_value(ListResponse::from(result)).unwrap();
        assert!(json.get("parent_link").is_none());
        assert_eq!(json["entries"], serde_json::json!([]));
    }

    #[test]
    fn test_render_html_escapes_names() {
        let listing = ListResponse {
            path: "/".into(),
            entries: vec![EntryResponse {
                name: "<script>.txt".into(),
                kind: "file",
                size: Some("1 B".into()),
                link: "/list?d=%3Cscript%3E.txt".into(),
            }],
            parent_link: None,
        };

        let page = render_html(&listing);

        assert!(page.contains("&lt;script&gt;.txt"));
        assert!(!page.contains("<script>"));
        assert!(!page.contains(">..</a>"));
    }

    #[test]
    fn test_error_response_status() {
        let response = ServiceError::from(PathError::Forbidden("../etc".into())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
