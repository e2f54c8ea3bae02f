use crate::dto::ErrorBody;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::warn;
use zkadmin_core::{AdminError, ErrorKind};

/// An [`AdminError`] rendered as `{code, message}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub AdminError);

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        Self(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::VersionConflict => StatusCode::CONFLICT,
        ErrorKind::Connectivity => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            warn!("request failed: {}", self.0);
        }
        let body = ErrorBody {
            code: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
