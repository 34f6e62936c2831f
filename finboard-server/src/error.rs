//! Core errors as HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use finboard_core::Error;

/// A core error on its way to the client
///
/// `public` replaces the message of server-side failures so upstream and
/// database details stay in the log.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    public: Option<&'static str>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized() -> Self {
        Error::auth("Not authenticated").into()
    }

    pub fn status(&self) -> StatusCode {
        match self.error {
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::Conflict(_) => StatusCode::BAD_REQUEST,
            Error::Upstream(_)
            | Error::Database(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match (&self.error, self.public) {
            (Error::Auth(msg), _)
            | (Error::Validation(msg), _)
            | (Error::Conflict(msg), _)
            | (Error::NotFound(msg), _) => msg.clone(),
            (_, Some(public)) => public.to_string(),
            (other, None) => other.to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            error,
            public: None,
        }
    }
}

/// Attach the message a client sees when a handler fails server-side
pub trait PublicMessage<T> {
    fn public(self, message: &'static str) -> ApiResult<T>;
}

impl<T> PublicMessage<T> for finboard_core::Result<T> {
    fn public(self, message: &'static str) -> ApiResult<T> {
        self.map_err(|error| ApiError {
            error,
            public: Some(message),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.error, "request failed");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
