use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use snafu::{Location, Snafu};

use crate::auth::Role;
use crate::media::MediaError;
use crate::payment::PaymentError;
use crate::service::{ErrorKind, ServiceError};
use crate::Located;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(context(false), display("{source}"))]
    Service { source: ServiceError },

    #[snafu(display("this action needs a {expected:?} account"))]
    WrongRole {
        expected: Role,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot act on behalf of user `{user}`"))]
    OtherUser {
        user: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed request body: {source}"))]
    Body {
        source: JsonRejection,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed upload: {source}"))]
    Upload {
        source: MultipartError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the upload has no `{field}` file"))]
    MissingUpload {
        field: &'static str,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Service { source, .. } => source.kind(),
            ApiError::WrongRole { .. } | ApiError::OtherUser { .. } => ErrorKind::Forbidden,
            ApiError::Body { .. }
            | ApiError::Upload { .. }
            | ApiError::MissingUpload { .. } => ErrorKind::Validation,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ApiError::Service { source, .. } => match source {
                ServiceError::Validation { .. } => "Validation",
                ServiceError::NotFound { .. } => "NotFound",
                ServiceError::Forbidden { .. } => "Forbidden",
                ServiceError::Conflict { .. } => "Conflict",
                ServiceError::Media { .. } => "Media",
                ServiceError::Payment { .. } => "Payment",
                ServiceError::ExternalTimeout { .. } => "ExternalTimeout",
                ServiceError::Database { .. } => "Database",
            },
            ApiError::WrongRole { .. } => "WrongRole",
            ApiError::OtherUser { .. } => "OtherUser",
            ApiError::Body { .. } => "Body",
            ApiError::Upload { .. } => "Upload",
            ApiError::MissingUpload { .. } => "MissingUpload",
        }
    }
}

impl ApiError {
    /// What a client learns about a failed external call. The full error chain is only logged.
    fn external_message(&self) -> String {
        let ApiError::Service { source } = self else {
            return "external service failed".to_string();
        };

        match source {
            ServiceError::Media {
                source: MediaError::Rejected { action, status, message, .. },
                ..
            } => format!("the media service rejected the {action} request ({status}): {message}"),
            ServiceError::Media { .. } => "media service failed".to_string(),
            ServiceError::Payment {
                source: PaymentError::Rejected { action, status, message, .. },
                ..
            } => format!("the payment gateway rejected the {action} request ({status}): {message}"),
            ServiceError::Payment { .. } => "payment gateway failed".to_string(),
            ServiceError::ExternalTimeout { service, after, .. } => {
                format!("{service} did not answer within {after:?}")
            }
            _ => "external service failed".to_string(),
        }
    }
}

impl Located for ApiError {
    fn location(&self) -> Location {
        match self {
            ApiError::Service { source } => source.location(),
            ApiError::WrongRole { location, .. }
            | ApiError::OtherUser { location, .. }
            | ApiError::Body { location, .. }
            | ApiError::Upload { location, .. }
            | ApiError::MissingUpload { location, .. } => *location,
        }
    }
}

pub fn status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
    error: &'static str,
    kind: ErrorKind,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::Internal => {
                tracing::error!(error = ?self, location = %self.location(), "request failed: {}", self);
                "internal server error".to_string()
            }
            ErrorKind::ExternalService => {
                tracing::warn!(error = ?self, location = %self.location(), "external service failed: {}", self);
                self.external_message()
            }
            _ => self.to_string(),
        };

        let content = ErrorResponse {
            message,
            error: self.name(),
            kind,
        };

        (status(kind), Json(content)).into_response()
    }
}
