//! Defines the `ApiError` type that can be returned from an API handler, which
//! specifies an HTTP status code and wraps an `anyhow::Error`. It implements
//! `IntoResponse`, allowing handlers to return a `Result<Json<T>, ApiError>`.
//! `From` impls exist for `anyhow::Error`, `Rejection`, and `SourceError` with
//! reasonable default status codes. The http status code can be customized
//! using `ApiErrorExt::with_status` if you need to return a specific response
//! status for a given error.
use super::Rejection;
use crate::sources::SourceError;
use axum::http::StatusCode;

pub trait ApiErrorExt {
    /// Sets the given http response status to use when responding with this error.
    fn with_status(self, status: StatusCode) -> ApiError;
}

impl<E: Into<ApiError> + Sized> ApiErrorExt for E {
    fn with_status(self, status: StatusCode) -> ApiError {
        let mut err: ApiError = self.into();
        err.status = status;
        err
    }
}

/// An error response
#[derive(Debug, thiserror::Error, serde::Serialize)]
#[error("status: {status}, error: {error}")]
pub struct ApiError {
    /// The HTTP status code
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,

    /// The error message
    #[serde(serialize_with = "serialize_error")]
    #[source]
    pub error: anyhow::Error,
}

fn serialize_status<S: serde::Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(status.as_u16())
}

fn serialize_error<S: serde::Serializer>(error: &anyhow::Error, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{error:#}")) // alternate renders nested causes
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
        }
    }
}

impl From<Rejection> for ApiError {
    fn from(value: Rejection) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::Error::from(value).context("Input validation error"),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(value: SourceError) -> Self {
        match value {
            SourceError::UnknownUser(_) | SourceError::UnknownAlert(_) => {
                anyhow::Error::from(value).with_status(StatusCode::NOT_FOUND)
            }
            SourceError::Other(error) => error.into(),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status;
        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.error), "API responding with internal error");
        }
        (status, axum::Json(self)).into_response()
    }
}
