//! `FileService` implementation

use axum::body::Bytes;
use futures::StreamExt;
use log::{debug, info};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::io::{StreamReader, SyncIoBridge};
use tonic::{Request, Response, Status, Streaming};

use crate::grpc::proto::file_service_server::{FileService, FileServiceServer};
use crate::grpc::proto::upload_file_request::Data;
use crate::grpc::proto::{
    self, DirectoryEntry, FileInfo, ListDirectoryRequest, ListDirectoryResponse,
    UploadFileRequest, UploadFileResponse,
};
use crate::protocol::handlers::{SharedState, run_blocking};
use crate::protocol::list_link;
use crate::storage::{EntryKind, ListResult, list_directory};
use crate::transfer::{self, UploadMode, UploadRequest};

pub struct GrpcFileService {
    state: SharedState,
}

impl GrpcFileService {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    pub fn into_server(self) -> FileServiceServer<Self> {
        FileServiceServer::new(self)
    }
}

impl From<ListResult> for ListDirectoryResponse {
    fn from(result: ListResult) -> Self {
        let entries = result
            .entries
            .into_iter()
            .map(|entry| DirectoryEntry {
                size: (entry.kind == EntryKind::File).then_some(entry.size),
                r#type: entry.kind.as_str().to_string(),
                link: list_link(&entry.link),
                name: entry.name,
            })
            .collect();

        Self {
            path: result.path,
            entries,
            parent_link: result.parent_link.as_deref().map(list_link),
        }
    }
}

impl From<proto::UploadMode> for UploadMode {
    fn from(mode: proto::UploadMode) -> Self {
        match mode {
            proto::UploadMode::Merge => UploadMode::Merge,
            proto::UploadMode::Replace | proto::UploadMode::Unspecified => UploadMode::Replace,
        }
    }
}

#[tonic::async_trait]
impl FileService for GrpcFileService {
    async fn list_directory(
        &self,
        request: Request<ListDirectoryRequest>,
    ) -> Result<Response<ListDirectoryResponse>, Status> {
        let requested = request.into_inner().directory.unwrap_or_default();
        let state = self.state.clone();

        let listing = run_blocking(move || {
            let resolved = state.resolver.resolve(&requested)?;
            Ok(list_directory(&resolved.real, &resolved.display)?)
        })
        .await?;

        info!("Listed {} over gRPC ({} entries)", listing.path, listing.entries.len());
        Ok(Response::new(listing.into()))
    }

    async fn upload_file(
        &self,
        request: Request<Streaming<UploadFileRequest>>,
    ) -> Result<Response<UploadFileResponse>, Status> {
        let mut stream = request.into_inner();

        let info: FileInfo = match stream.message().await? {
            Some(UploadFileRequest {
                data: Some(Data::Info(info)),
            }) => info,
            Some(_) => {
                return Err(Status::invalid_argument(
                    "Missing file info: the first message must contain file metadata",
                ));
            }
            None => return Err(Status::invalid_argument("No data received from client")),
        };
        let mode = UploadMode::from(info.mode());
        debug!(
            "gRPC upload request: path='{}' filename='{}' mode={}",
            info.path,
            info.filename,
            mode.as_str()
        );

        let repeated_info = Arc::new(AtomicBool::new(false));
        let chunks = stream.map({
            let repeated_info = repeated_info.clone();
            move |message| match message {
                Ok(UploadFileRequest {
                    data: Some(Data::ChunkData(chunk)),
                }) => Ok(Bytes::from(chunk)),
                Ok(UploadFileRequest {
                    data: Some(Data::Info(_)),
                }) => {
                    repeated_info.store(true, Ordering::Relaxed);
                    Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "unexpected file info after the first message",
                    ))
                }
                Ok(UploadFileRequest { data: None }) => Ok(Bytes::new()),
                Err(status) => Err(io::Error::other(status)),
            }
        });
        let reader = SyncIoBridge::new(StreamReader::new(Box::pin(chunks)));

        let state = self.state.clone();
        let result = run_blocking(move || {
            let request = UploadRequest {
                destination: &info.path,
                file_name: &info.filename,
                mode,
            };
            transfer::upload(&state.resolver, &request, reader)
        })
        .await;

        let result = match result {
            Err(_) if repeated_info.load(Ordering::Relaxed) => {
                return Err(Status::invalid_argument(
                    "Received unexpected file info after the first message",
                ));
            }
            other => other?,
        };

        Ok(Response::new(UploadFileResponse {
            message: "File uploaded successfully".to_string(),
            file_path: result.display_path,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AppState;
    use crate::storage::PathResolver;
    use std::fs;
    use tonic::Code;

    fn service_for(dir: &std::path::Path) -> GrpcFileService {
        GrpcFileService::new(Arc::new(AppState {
            resolver: PathResolver::new(dir.to_str()),
        }))
    }

    #[tokio::test]
    async fn test_list_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("site")).unwrap();
        fs::write(dir.path().join("site/index.html"), "<h1>hi</h1>").unwrap();
        fs::create_dir(dir.path().join("site/css")).unwrap();

        let response = service_for(dir.path())
            .list_directory(Request::new(ListDirectoryRequest {
                directory: Some("site".into()),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.path, "/site");
        assert_eq!(response.parent_link.as_deref(), Some("/list?d=/"));
        assert_eq!(response.entries.len(), 2);
        assert_eq!(response.entries[0].name, "css");
        assert_eq!(response.entries[0].r#type, "directory");
        assert_eq!(response.entries[0].size, None);
        assert_eq!(response.entries[1].name, "index.html");
        assert_eq!(response.entries[1].size.as_deref(), Some("11 B"));
        assert_eq!(response.entries[1].link, "/list?d=site/index.html");
    }

    #[tokio::test]
    async fn test_list_root_has_no_parent() {
        let dir = tempfile::tempdir().unwrap();

        let response = service_for(dir.path())
            .list_directory(Request::new(ListDirectoryRequest { directory: None }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.path, "/");
        assert!(response.parent_link.is_none());
        assert!(response.entries.is_empty());
    }

    #[tokio::test]
    async fn test_list_errors_map_to_grpc_codes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain.txt"), "x").unwrap();
        let service = service_for(dir.path());

        for (directory, code) in [
            ("../outside", Code::PermissionDenied),
            ("missing", Code::NotFound),
            ("plain.txt", Code::InvalidArgument),
        ] {
            let status = service
                .list_directory(Request::new(ListDirectoryRequest {
                    directory: Some(directory.into()),
                }))
                .await
                .unwrap_err();
            assert_eq!(status.code(), code, "directory {directory:?}");
        }
    }

    #[test]
    fn test_unspecified_mode_replaces() {
        assert_eq!(UploadMode::from(proto::UploadMode::Unspecified), UploadMode::Replace);
        assert_eq!(UploadMode::from(proto::UploadMode::Replace), UploadMode::Replace);
        assert_eq!(UploadMode::from(proto::UploadMode::Merge), UploadMode::Merge);
    }
}
