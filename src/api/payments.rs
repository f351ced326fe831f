use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use snafu::ResultExt as _;
use tracing::instrument;

use super::{App, BodySnafu, Result};
use crate::payment::{ChargeRequest, ChargeResult};

/// Charges the token. A declined card answers 402 with the decline reason, nothing is retried.
#[instrument(skip(app, payload))]
pub async fn charge(
    State(app): State<App>,
    payload: std::result::Result<Json<ChargeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChargeResult>)> {
    let Json(request) = payload.context(BodySnafu)?;
    let result = app.payments.charge(request).await?;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::PAYMENT_REQUIRED
    };

    Ok((status, Json(result)))
}
