use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use libobjcache::{DispatchError, StatusBody, StorageError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Generating response for AppError: {:?}", self);

        let (status_code, message) = match &self {
            Self::Dispatch(DispatchError::Storage(StorageError::InvalidKey(_))) => {
                (StatusCode::BAD_REQUEST, "Invalid Key")
            }
            // Storage failures are not recovered locally and stay opaque to clients.
            Self::Dispatch(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        };

        (status_code, Json(StatusBody::new(message))).into_response()
    }
}
