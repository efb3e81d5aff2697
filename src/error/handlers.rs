//! Error handlers
//!
//! Logs service errors and maps their category to an HTTP status or a gRPC
//! status code.

use axum::http::StatusCode;
use log::{error, warn};
use tonic::{Code, Status};

use crate::error::types::{ErrorKind, ServiceError};

/// Handle a service error
pub fn handle_error(err: &ServiceError) {
    match err.kind() {
        ErrorKind::Io => error!("Request failed: {}", err),
        _ => warn!("Request rejected: {}", err),
    }
}

/// Convert an error category to an HTTP status code
pub fn kind_to_status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InputInvalid => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::WrongType => StatusCode::BAD_REQUEST,
        ErrorKind::BadFormat => StatusCode::BAD_REQUEST,
        ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert error to HTTP status code
pub fn error_to_status_code(err: &ServiceError) -> StatusCode {
    kind_to_status_code(err.kind())
}

/// Convert an error category to a gRPC status code
pub fn kind_to_grpc_code(kind: ErrorKind) -> Code {
    match kind {
        ErrorKind::InputInvalid | ErrorKind::WrongType | ErrorKind::BadFormat => {
            Code::InvalidArgument
        }
        ErrorKind::Forbidden => Code::PermissionDenied,
        ErrorKind::NotFound => Code::NotFound,
        ErrorKind::Io => Code::Internal,
    }
}

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        handle_error(&err);
        let kind = err.kind();
        let message = match kind {
            ErrorKind::Io => "Internal server error".to_string(),
            _ => err.to_string(),
        };
        Status::new(kind_to_grpc_code(kind), message)
    }
}
