use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use snafu::ResultExt as _;
use tracing::instrument;

use super::views::{IdentityView, ProfileView};
use super::{App, BodySnafu, OtherUserSnafu, Result};
use crate::auth::Caller;
use crate::service::{NewIdentity, ProfileUpdate};

#[instrument(skip(app, payload))]
pub async fn register_student(
    State(app): State<App>,
    caller: Caller,
    payload: std::result::Result<Json<NewIdentity>, JsonRejection>,
) -> Result<Json<IdentityView>> {
    let Json(data) = payload.context(BodySnafu)?;
    let student = app.profiles.register_student(&caller.student(), data).await?;
    Ok(Json(student.into()))
}

#[instrument(skip(app, payload))]
pub async fn register_tutor(
    State(app): State<App>,
    caller: Caller,
    payload: std::result::Result<Json<NewIdentity>, JsonRejection>,
) -> Result<Json<IdentityView>> {
    let Json(data) = payload.context(BodySnafu)?;
    let tutor = app.profiles.register_tutor(&caller.tutor(), data).await?;
    Ok(Json(tutor.into()))
}

#[instrument(skip(app, payload))]
pub async fn update_profile(
    State(app): State<App>,
    caller: Caller,
    Path(user): Path<String>,
    payload: std::result::Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<ProfileView>> {
    if caller.user != user {
        return OtherUserSnafu { user }.fail();
    }

    let Json(data) = payload.context(BodySnafu)?;
    let profile = app.profiles.update_profile(&user, data).await?;
    Ok(Json(profile.into()))
}
