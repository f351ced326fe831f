use std::time::Duration;

use serde::Serialize;
use snafu::{GenerateImplicitData as _, Location, Snafu};

use crate::database::DatabaseQueryError;
use crate::media::MediaError;
use crate::payment::PaymentError;
use crate::Located;

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

/// Coarse classification of a [ServiceError], it decides the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    /// Another request holds the records, retrying may succeed.
    Conflict,
    ExternalService,
    Internal,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ServiceError {
    #[snafu(display("{message}"))]
    Validation {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{entity} `{id}` does not exist"))]
    NotFound {
        entity: &'static str,
        id: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{message}"))]
    Forbidden {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{message}, try again later"))]
    Conflict {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("media service failed: {source}"))]
    Media {
        source: MediaError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("payment gateway failed: {source}"))]
    Payment {
        source: PaymentError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{service} did not answer within {after:?}"))]
    ExternalTimeout {
        service: &'static str,
        after: Duration,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("database query failed at {location}: {source}"))]
    Database {
        source: DatabaseQueryError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation { .. } => ErrorKind::Validation,
            ServiceError::NotFound { .. } => ErrorKind::NotFound,
            ServiceError::Forbidden { .. } => ErrorKind::Forbidden,
            ServiceError::Conflict { .. } => ErrorKind::Conflict,
            ServiceError::Media { .. }
            | ServiceError::Payment { .. }
            | ServiceError::ExternalTimeout { .. } => ErrorKind::ExternalService,
            ServiceError::Database { .. } => ErrorKind::Internal,
        }
    }
}

impl Located for ServiceError {
    fn location(&self) -> Location {
        match self {
            ServiceError::Validation { location, .. }
            | ServiceError::NotFound { location, .. }
            | ServiceError::Forbidden { location, .. }
            | ServiceError::Conflict { location, .. }
            | ServiceError::Media { location, .. }
            | ServiceError::Payment { location, .. }
            | ServiceError::ExternalTimeout { location, .. }
            | ServiceError::Database { location, .. } => *location,
        }
    }
}

impl From<DatabaseQueryError> for ServiceError {
    #[track_caller]
    fn from(source: DatabaseQueryError) -> Self {
        ServiceError::Database {
            source,
            location: Location::generate(),
        }
    }
}
