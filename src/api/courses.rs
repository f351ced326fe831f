use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use snafu::{OptionExt as _, ResultExt as _};
use tracing::instrument;

use super::views::{CourseView, VideoRemovalView, VideoView};
use super::{App, BodySnafu, MissingUploadSnafu, Result, UploadSnafu, WrongRoleSnafu};
use crate::auth::{Caller, Role};
use crate::database::Record;
use crate::media::MediaPayload;
use crate::service::{CourseDeletion, CourseDetails, CoursePatch, EnrollmentResult, NewCourse, NewVideo};

#[derive(Debug, Deserialize)]
pub struct CreateCourse {
    #[serde(flatten)]
    pub course: NewCourse,
    /// A remote or `data:` URL of the cover image.
    pub thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddVideo {
    pub title: String,
    /// A remote or `data:` URL of the lecture.
    pub video: String,
}

#[derive(Debug, Deserialize)]
pub struct Discount {
    pub discount: Decimal,
}

#[instrument(skip(app, payload))]
pub async fn create(
    State(app): State<App>,
    caller: Caller,
    payload: std::result::Result<Json<CreateCourse>, JsonRejection>,
) -> Result<(StatusCode, Json<CourseView>)> {
    if caller.role != Role::Tutor {
        return WrongRoleSnafu {
            expected: Role::Tutor,
        }
        .fail();
    }

    let Json(payload) = payload.context(BodySnafu)?;
    let thumbnail = payload.thumbnail.map(MediaPayload::Url);
    let course = app
        .catalog
        .create_course(payload.course, thumbnail, &caller.tutor())
        .await?;

    Ok((StatusCode::CREATED, Json(course.into())))
}

pub async fn list(State(app): State<App>) -> Result<Json<Vec<CourseDetails>>> {
    Ok(Json(app.catalog.list_courses().await?))
}

pub async fn show(State(app): State<App>, Path(id): Path<String>) -> Result<Json<CourseDetails>> {
    Ok(Json(app.catalog.course(&Record::new(id)).await?))
}

#[instrument(skip(app))]
pub async fn remove(
    State(app): State<App>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CourseDeletion>> {
    let deletion = app.catalog.delete_course(&Record::new(id), &caller.tutor()).await?;
    Ok(Json(deletion))
}

#[instrument(skip(app))]
pub async fn enroll(
    State(app): State<App>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<EnrollmentResult>> {
    let result = app.enrollment.enroll(&Record::new(id), &caller.student()).await?;
    Ok(Json(result))
}

#[instrument(skip(app, payload))]
pub async fn update(
    State(app): State<App>,
    caller: Caller,
    Path(id): Path<String>,
    payload: std::result::Result<Json<CoursePatch>, JsonRejection>,
) -> Result<Json<CourseView>> {
    let Json(patch) = payload.context(BodySnafu)?;
    let course = app
        .catalog
        .update_metadata(&Record::new(id), patch, &caller.tutor())
        .await?;

    Ok(Json(course.into()))
}

#[instrument(skip(app, payload))]
pub async fn discount(
    State(app): State<App>,
    caller: Caller,
    Path(id): Path<String>,
    payload: std::result::Result<Json<Discount>, JsonRejection>,
) -> Result<Json<CourseView>> {
    let Json(Discount { discount }) = payload.context(BodySnafu)?;
    let course = app
        .catalog
        .apply_discount(&Record::new(id), discount, &caller.tutor())
        .await?;

    Ok(Json(course.into()))
}

/// Takes the `thumbnail` file of a multipart form.
#[instrument(skip(app, form))]
pub async fn thumbnail(
    State(app): State<App>,
    caller: Caller,
    Path(id): Path<String>,
    mut form: Multipart,
) -> Result<Json<CourseView>> {
    let mut upload = None;
    while let Some(field) = form.next_field().await.context(UploadSnafu)? {
        if field.name() != Some("thumbnail") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("thumbnail").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.context(UploadSnafu)?;

        upload = Some(MediaPayload::Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload.context(MissingUploadSnafu { field: "thumbnail" })?;
    let course = app
        .catalog
        .update_thumbnail(&Record::new(id), upload, &caller.tutor())
        .await?;

    Ok(Json(course.into()))
}

#[instrument(skip(app, payload))]
pub async fn add_video(
    State(app): State<App>,
    caller: Caller,
    Path(id): Path<String>,
    payload: std::result::Result<Json<AddVideo>, JsonRejection>,
) -> Result<(StatusCode, Json<VideoView>)> {
    let Json(payload) = payload.context(BodySnafu)?;
    let video = app
        .catalog
        .add_video(
            &Record::new(id),
            NewVideo {
                title: payload.title,
            },
            MediaPayload::Url(payload.video),
            &caller.tutor(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(video.into())))
}

#[instrument(skip(app))]
pub async fn remove_video(
    State(app): State<App>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<VideoRemovalView>> {
    let removal = app.catalog.remove_video(&Record::new(id), &caller.tutor()).await?;
    Ok(Json(removal.into()))
}
