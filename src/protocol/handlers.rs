//! HTTP request handlers
//!
//! Each handler extracts its parameters, runs the blocking filesystem work on
//! the blocking thread pool and converts the outcome into a response. Raw
//! request bodies are streamed into the upload orchestrator without being
//! buffered; form uploads are handled in [`crate::protocol::multipart`].

use axum::Json;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use futures::TryStreamExt;
use log::{debug, info};
use std::io;
use std::sync::Arc;
use tokio_util::io::{StreamReader, SyncIoBridge};

use crate::error::ServiceError;
use crate::protocol::multipart;
use crate::protocol::params::{ListParams, UploadParams};
use crate::protocol::responses::{ListResponse, UploadResponse, render_html};
use crate::storage::{PathResolver, list_directory};
use crate::transfer::{self, UploadMode, UploadRequest};

/// State shared by all handlers
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub resolver: PathResolver,
}

pub type SharedState = Arc<AppState>;

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "OK"
}

/// `GET /list?d=<path>`
///
/// Responds with JSON, or with an HTML page when the client accepts
/// `text/html`.
pub async fn handle_list(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let requested = params.d;
    let listing = run_blocking(move || {
        let resolved = state.resolver.resolve(&requested)?;
        Ok(list_directory(&resolved.real, &resolved.display)?)
    })
    .await?;

    info!("Listed {} ({} entries)", listing.path, listing.entries.len());
    let body = ListResponse::from(listing);

    if accepts_html(&headers) {
        Ok(Html(render_html(&body)).into_response())
    } else {
        Ok(Json(body).into_response())
    }
}

/// `POST /` merges into the target directory, `PUT /` replaces its contents.
///
/// The payload is either a `multipart/form-data` form with `path` and
/// `tarfile` parts, or a raw body described by `?path=<dir>&filename=<name>`.
///
/// # Arguments
///
/// * `state` - Shared handler state holding the path resolver.
/// * `method` - Request method, selecting the upload mode.
/// * `params` - Target directory and payload file name of a raw upload.
/// * `request` - The request carrying the payload.
pub async fn handle_upload(
    State(state): State<SharedState>,
    method: Method,
    Query(params): Query<UploadParams>,
    request: Request,
) -> Result<(StatusCode, Json<UploadResponse>), ServiceError> {
    let mode = if method == Method::PUT {
        UploadMode::Replace
    } else {
        UploadMode::Merge
    };

    let result = if is_multipart(request.headers()) {
        debug!("Form upload request: mode={}", mode.as_str());
        let form = Multipart::from_request(request, &state)
            .await
            .map_err(|rejection| ServiceError::BadRequest(rejection.body_text()))?;
        multipart::receive_upload(state, form, mode).await?
    } else {
        debug!(
            "Upload request: path='{}' filename='{}' mode={}",
            params.path,
            params.filename,
            mode.as_str()
        );
        let stream = request.into_body().into_data_stream().map_err(io::Error::other);
        let reader = SyncIoBridge::new(StreamReader::new(stream));

        run_blocking(move || {
            let request = UploadRequest {
                destination: &params.path,
                file_name: &params.filename,
                mode,
            };
            transfer::upload(&state.resolver, &request, reader)
        })
        .await?
    };

    let message = if result.kind.is_archive() {
        format!("Archive extracted to {}", result.display_path)
    } else {
        format!("File stored at {}", result.display_path)
    };
    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            message,
            path: result.display_path,
        }),
    ))
}

fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("text/html"))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

/// Runs filesystem work on the blocking thread pool.
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
}
