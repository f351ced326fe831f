use std::future::Future;
use std::time::Duration;

pub use activity::Activity;
pub use catalog::*;
pub use enrollment::*;
pub use error::{ErrorKind, Result, ServiceError};
pub use locks::Locks;
pub use payments::Payments;
pub use profile::*;

mod activity;
mod catalog;
mod enrollment;
mod error;
mod locks;
mod payments;
mod profile;

#[cfg(test)]
pub(crate) mod testing;

use error::ExternalTimeoutSnafu;

/// Bounds a call to an external service, the inner result is left for the caller to classify.
async fn bounded<F: Future>(service: &'static str, after: Duration, call: F) -> Result<F::Output> {
    match tokio::time::timeout(after, call).await {
        Ok(output) => Ok(output),
        Err(_) => {
            tracing::warn!(service, timeout = ?after, "external call timed out");
            ExternalTimeoutSnafu { service, after }.fail()
        }
    }
}
