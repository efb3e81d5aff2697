//! Form uploads
//!
//! A `multipart/form-data` upload carries the target directory in a `path`
//! field and the payload in a `tarfile` file part; the part's file name
//! selects how the payload is stored. When `path` arrives first the part is
//! streamed straight into the orchestrator. Otherwise the part is spooled to
//! an anonymous temporary file until the rest of the form has been read.

use axum::body::Bytes;
use axum::extract::multipart::{Field, Multipart, MultipartError};
use futures::SinkExt;
use futures::channel::mpsc;
use log::debug;
use std::fs::File;
use std::io::{self, SeekFrom};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::{StreamReader, SyncIoBridge};

use crate::error::{ServiceError, TransferError};
use crate::protocol::handlers::{SharedState, run_blocking};
use crate::transfer::{self, UploadMode, UploadRequest, UploadResult};

/// Form field holding the target directory
pub const PATH_FIELD: &str = "path";
/// Form part holding the payload
pub const FILE_FIELD: &str = "tarfile";

/// Chunks buffered between the form reader and the blocking upload.
const CHUNK_QUEUE: usize = 16;

/// Reads an upload form and stores its payload.
pub async fn receive_upload(
    state: SharedState,
    mut multipart: Multipart,
    mode: UploadMode,
) -> Result<UploadResult, ServiceError> {
    let mut destination: Option<String> = None;
    let mut spooled: Option<(String, File)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(PATH_FIELD) => destination = Some(field.text().await.map_err(bad_form)?),
            Some(FILE_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                if let Some(destination) = destination.take() {
                    return stream_part(state, field, destination, file_name, mode).await;
                }
                debug!("Spooling '{}' until the target path is known", file_name);
                spooled = Some((file_name, spool_part(field).await?));
            }
            other => debug!("Ignoring form field {:?}", other),
        }
    }

    let Some((file_name, file)) = spooled else {
        return Err(ServiceError::BadRequest(format!(
            "file part '{FILE_FIELD}' not found in request"
        )));
    };
    let destination = destination.unwrap_or_default();

    run_blocking(move || {
        let request = UploadRequest {
            destination: &destination,
            file_name: &file_name,
            mode,
        };
        transfer::upload(&state.resolver, &request, file)
    })
    .await
}

/// Feeds the part through a bounded channel into the blocking upload.
async fn stream_part(
    state: SharedState,
    mut field: Field<'_>,
    destination: String,
    file_name: String,
    mode: UploadMode,
) -> Result<UploadResult, ServiceError> {
    let (mut chunks, queue) = mpsc::channel::<io::Result<Bytes>>(CHUNK_QUEUE);
    let reader = SyncIoBridge::new(StreamReader::new(queue));

    let task = tokio::task::spawn_blocking(move || {
        let request = UploadRequest {
            destination: &destination,
            file_name: &file_name,
            mode,
        };
        transfer::upload(&state.resolver, &request, reader)
    });

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => Ok(chunk),
            Ok(None) => break,
            Err(e) => Err(io::Error::other(e)),
        };
        let failed = chunk.is_err();
        // A closed queue means the upload has already finished or failed.
        if chunks.send(chunk).await.is_err() || failed {
            break;
        }
    }
    drop(chunks);

    task.await.map_err(|e| ServiceError::Internal(e.to_string()))?
}

/// Copies the part into an unnamed temporary file, rewound for reading.
async fn spool_part(mut field: Field<'_>) -> Result<File, ServiceError> {
    let spool_error = |source: io::Error| ServiceError::from(TransferError::Spool(source));

    let file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .map_err(spool_error)?;
    let mut file = tokio::fs::File::from_std(file);

    while let Some(chunk) = field.chunk().await.map_err(bad_form)? {
        file.write_all(&chunk).await.map_err(spool_error)?;
    }
    file.flush().await.map_err(spool_error)?;
    file.seek(SeekFrom::Start(0)).await.map_err(spool_error)?;

    Ok(file.into_std().await)
}

fn bad_form(err: MultipartError) -> ServiceError {
    ServiceError::BadRequest(err.body_text())
}
