use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use divtrack_core::ErrorKind;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<divtrack_core::Error> for AppError {
    fn from(error: divtrack_core::Error) -> Self {
        match error.kind() {
            ErrorKind::InvalidInput => Self::BadRequest(error.to_string()),
            ErrorKind::Storage => Self::Storage(error.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_by_kind() {
        let invalid = AppError::from(divtrack_core::Error::InvalidInput("empty userId".into()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let storage = AppError::from(divtrack_core::Error::Database("locked".into()));
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(storage.to_string().contains("locked"));
    }
}
