//! gRPC transport
//!
//! Serves `fileservice.v1.FileService` next to the HTTP endpoints. Both
//! transports share one [`PathResolver`](crate::storage::PathResolver) and the
//! same upload and listing operations.

pub mod service;

pub use service::GrpcFileService;

#[allow(clippy::all)]
pub mod proto {
    tonic::include_proto!("fileservice.v1");
}
