use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt as _, ResultExt as _};
use tracing::instrument;

use super::error::{ForbiddenSnafu, MediaSnafu, NotFoundSnafu, Result, ValidationSnafu};
use super::{bounded, Activity, Locks};
use crate::database::record::{serialize_key, serialize_keys};
use crate::database::{Database, Record, Thing};
use crate::media::{MediaKind, MediaPayload, MediaRef, MediaStore};
use crate::model::{Course, LogData, Review, Student, Timestamp, Tutor, Video};

/// Owns courses and their videos, and keeps the derived course fields in step with them.
#[derive(Debug, Clone, new)]
pub struct Catalog {
    database: Database,
    media: Arc<dyn MediaStore>,
    locks: Locks,
    activity: Activity,
    external_timeout: Duration,
}

/// Fields of a new course. Everything is optional here so missing fields are reported as validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCourse {
    pub course_name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub level: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVideo {
    pub title: String,
}

/// The course fields an author may change. Anything else is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoursePatch {
    pub course_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub price: Option<Decimal>,
    /// A remote or `data:` URL, stored through the media service.
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoRemoval {
    Removed(Course),
    /// The video was not listed by its course. Its media and record are gone regardless.
    NotPresent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseDeletion {
    #[serde(serialize_with = "serialize_key")]
    pub course: Record<Course>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoSummary {
    #[serde(serialize_with = "serialize_key")]
    pub id: Record<Video>,
    pub title: String,
    pub media_url: String,
    pub public_id: String,
    pub duration_minutes: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReviewSummary {
    #[serde(serialize_with = "serialize_key")]
    pub id: Record<Review>,
    pub reviewer_name: String,
    pub body: String,
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuthorSummary {
    #[serde(serialize_with = "serialize_key")]
    pub id: Record<Tutor>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, serialize_with = "serialize_keys")]
    pub created_courses: Vec<Record<Course>>,
}

/// A course with its videos, reviews and author resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseDetails {
    #[serde(serialize_with = "serialize_key")]
    pub id: Record<Course>,
    pub course_name: String,
    pub description: String,
    pub price: Decimal,
    pub discount: Decimal,
    pub level: String,
    pub category: String,
    pub thumbnail: String,
    pub duration_minutes: Decimal,
    pub total_subscriptions: usize,
    pub rating: Option<Decimal>,
    /// `None` when the author's record no longer exists.
    pub author: Option<AuthorSummary>,
    pub videos: Vec<VideoSummary>,
    pub reviews: Vec<ReviewSummary>,
    #[serde(serialize_with = "serialize_keys")]
    pub enrolled_students: Vec<Record<Student>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

struct ValidCourse {
    course_name: String,
    description: String,
    price: Decimal,
    discount: Decimal,
    level: String,
    category: String,
}

fn required(field: &'static str, value: Option<String>) -> Result<String> {
    match value.map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => ValidationSnafu {
            message: format!("`{field}` is required"),
        }
        .fail(),
    }
}

fn non_empty(field: &'static str, value: Option<String>) -> Result<Option<String>> {
    value.map(|value| required(field, Some(value))).transpose()
}

fn validate_price(price: Decimal) -> Result<Decimal> {
    if price < Decimal::ZERO {
        return ValidationSnafu {
            message: format!("price must not be negative, got {price}"),
        }
        .fail();
    }

    Ok(price)
}

fn validate_discount(percent: Decimal) -> Result<Decimal> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return ValidationSnafu {
            message: format!("discount must be between 0 and 100 percent, got {percent}"),
        }
        .fail();
    }

    Ok(percent)
}

impl NewCourse {
    fn validate(self) -> Result<ValidCourse> {
        let price = self.price.context(ValidationSnafu {
            message: "`price` is required",
        })?;

        Ok(ValidCourse {
            course_name: required("course_name", self.course_name)?,
            description: required("description", self.description)?,
            price: validate_price(price)?,
            discount: validate_discount(self.discount.unwrap_or_default())?,
            level: required("level", self.level)?,
            category: required("category", self.category)?,
        })
    }
}

impl CoursePatch {
    fn validate(self) -> Result<Self> {
        Ok(Self {
            course_name: non_empty("course_name", self.course_name)?,
            description: non_empty("description", self.description)?,
            category: non_empty("category", self.category)?,
            level: non_empty("level", self.level)?,
            price: self.price.map(validate_price).transpose()?,
            thumbnail: non_empty("thumbnail", self.thumbnail)?,
        })
    }

    fn apply(self, course: &mut Course) {
        if let Some(course_name) = self.course_name {
            course.course_name = course_name;
        }
        if let Some(description) = self.description {
            course.description = description;
        }
        if let Some(category) = self.category {
            course.category = category;
        }
        if let Some(level) = self.level {
            course.level = level;
        }
        if let Some(price) = self.price {
            course.price = price;
        }
    }
}

impl Catalog {
    async fn store_media(&self, payload: MediaPayload, kind: MediaKind) -> Result<MediaRef> {
        bounded("media service", self.external_timeout, self.media.store(payload, kind))
            .await?
            .context(MediaSnafu)
    }

    async fn delete_media(&self, public_id: &str, kind: MediaKind) -> Result<()> {
        bounded("media service", self.external_timeout, self.media.delete(public_id, kind))
            .await?
            .context(MediaSnafu)
    }

    /// Undoes an upload whose course write failed. The original error is what the caller sees.
    async fn discard_media(&self, media: &MediaRef, kind: MediaKind) {
        if let Err(error) = self.delete_media(&media.public_id, kind).await {
            tracing::warn!(public_id = %media.public_id, error = %error, "could not discard orphaned media `{}`", media.public_id);
        }
    }

    async fn course_record(&self, id: &Record<Course>) -> Result<Course> {
        self.database.fetch(id).await?.context(NotFoundSnafu {
            entity: "course",
            id: id.key(),
        })
    }

    async fn authored_course(&self, id: &Record<Course>, caller: &Record<Tutor>) -> Result<Course> {
        let course = self.course_record(id).await?;
        if !course.is_authored_by(caller) {
            return ForbiddenSnafu {
                message: format!("only the author may modify course `{}`", id.key()),
            }
            .fail();
        }

        Ok(course)
    }

    #[instrument(skip(self, data, thumbnail))]
    pub async fn create_course(
        &self,
        data: NewCourse,
        thumbnail: Option<MediaPayload>,
        author: &Record<Tutor>,
    ) -> Result<Course> {
        let data = data.validate()?;
        let thumbnail = thumbnail.context(ValidationSnafu {
            message: "`thumbnail` is required",
        })?;

        let _held = self.locks.lock(author).await?;
        let mut tutor: Tutor = self.database.fetch(author).await?.context(NotFoundSnafu {
            entity: "tutor",
            id: author.key(),
        })?;

        let media = self.store_media(thumbnail, MediaKind::Image).await?;

        let mut course = Course::new(
            data.course_name,
            data.description,
            author.clone(),
            data.price,
            data.level,
            data.category,
            media.url.clone(),
        );
        course.discount = data.discount;
        tutor.publish(course.id.clone());

        let committed = self
            .database
            .transaction()
            .create(&course)
            .update(&tutor)
            .commit()
            .await;

        if let Err(error) = committed {
            self.discard_media(&media, MediaKind::Image).await;
            return Err(error.into());
        }

        tracing::info!(course = %course.id, author = %author, "created course `{}`", course.course_name);
        self.activity
            .record(LogData::CourseCreated {
                course: course.id.clone(),
                author: author.clone(),
            })
            .await;

        Ok(course)
    }

    #[instrument(skip(self, media))]
    pub async fn add_video(
        &self,
        course_id: &Record<Course>,
        meta: NewVideo,
        media: MediaPayload,
        caller: &Record<Tutor>,
    ) -> Result<Video> {
        let title = required("title", Some(meta.title))?;

        let _held = self.locks.lock(course_id).await?;
        let mut course = self.authored_course(course_id, caller).await?;

        let stored = self.store_media(media, MediaKind::Video).await?;
        let video = Video::new(
            course.id.clone(),
            course.author.clone(),
            title,
            stored.url.clone(),
            stored.public_id.clone(),
            stored.duration_minutes(),
        );

        let recomputed = async {
            let mut videos = Video::of_course(course_id, &self.database).await?;
            videos.push(video.clone());

            course.videos.push(video.id.clone());
            course.recompute_duration(&videos);
            course.touch();

            self.database
                .transaction()
                .create(&video)
                .update(&course)
                .commit()
                .await
        };

        if let Err(error) = recomputed.await {
            self.discard_media(&stored, MediaKind::Video).await;
            return Err(error.into());
        }

        tracing::info!(course = %course.id, video = %video.id, duration = %video.duration_minutes, total = %course.duration_minutes, "added video `{}`", video.title);
        self.activity
            .record(LogData::VideoAdded {
                course: course.id.clone(),
                video: video.id.clone(),
                duration_minutes: video.duration_minutes,
            })
            .await;

        Ok(video)
    }

    #[instrument(skip(self))]
    pub async fn remove_video(
        &self,
        video_id: &Record<Video>,
        caller: &Record<Tutor>,
    ) -> Result<VideoRemoval> {
        let video: Video = self.database.fetch(video_id).await?.context(NotFoundSnafu {
            entity: "video",
            id: video_id.key(),
        })?;

        let _held = self.locks.lock(&video.course).await?;
        let course: Option<Course> = self.database.fetch(&video.course).await?;

        let author = course.as_ref().map_or(&video.author, |course| &course.author);
        if author != caller {
            return ForbiddenSnafu {
                message: format!("only the author may remove video `{}`", video_id.key()),
            }
            .fail();
        }

        self.delete_media(&video.public_id, MediaKind::Video).await?;

        let removal = match course {
            Some(mut course) if course.videos.contains(video_id) => {
                course.detach_video(video_id);
                let remaining: Vec<Video> = Video::of_course(&course.id, &self.database)
                    .await?
                    .into_iter()
                    .filter(|stored| &stored.id != video_id)
                    .collect();

                course.recompute_duration(&remaining);
                course.touch();

                self.database
                    .transaction()
                    .delete(video_id)
                    .update(&course)
                    .commit()
                    .await?;

                VideoRemoval::Removed(course)
            }
            _ => {
                tracing::warn!(video = %video_id, course = %video.course, "video `{}` was not listed by its course", video.title);
                self.database.transaction().delete(video_id).commit().await?;

                VideoRemoval::NotPresent
            }
        };

        self.activity
            .record(LogData::VideoRemoved {
                course: video.course.clone(),
                video: video_id.clone(),
                was_listed: matches!(removal, VideoRemoval::Removed(_)),
            })
            .await;

        Ok(removal)
    }

    /// Deletes the course with its videos and unlinks it from its author and students.
    ///
    /// Media that cannot be deleted is reported in `warnings` and does not stop the deletion.
    #[instrument(skip(self))]
    pub async fn delete_course(
        &self,
        course_id: &Record<Course>,
        caller: &Record<Tutor>,
    ) -> Result<CourseDeletion> {
        let _course_lock = self.locks.lock(course_id).await?;
        let course = self.authored_course(course_id, caller).await?;

        let mut related: Vec<&Thing> = vec![course.author.as_ref()];
        related.extend(course.enrolled_students.iter().map(|student| student.as_ref()));
        let _related_locks = self.locks.lock_all(&related).await?;

        let tutor: Option<Tutor> = self.database.fetch(&course.author).await?;
        let students: Vec<Student> = self.database.fetch_many(&course.enrolled_students).await?;
        let videos = Video::of_course(course_id, &self.database).await?;

        let deletions = videos
            .iter()
            .map(|video| self.delete_media(&video.public_id, MediaKind::Video));
        let warnings: Vec<String> = join_all(deletions)
            .await
            .into_iter()
            .zip(&videos)
            .filter_map(|(result, video)| {
                let error = result.err()?;
                tracing::warn!(video = %video.id, public_id = %video.public_id, error = %error, "could not delete media of video `{}`", video.title);
                Some(format!("media `{}` of video `{}` was not deleted: {error}", video.public_id, video.id.key()))
            })
            .collect();

        let mut transaction = self
            .database
            .transaction()
            .statement("DELETE videos WHERE course = $course", ("course", course_id))
            .delete(course_id);

        if let Some(mut tutor) = tutor {
            tutor.retract(course_id);
            transaction = transaction.update(&tutor);
        }

        for mut student in students {
            student.withdraw(course_id);
            transaction = transaction.update(&student);
        }

        transaction.commit().await?;

        tracing::info!(course = %course_id, videos = videos.len(), failures = warnings.len(), "deleted course `{}`", course.course_name);
        self.activity
            .record(LogData::CourseDeleted {
                course: course_id.clone(),
                videos: videos.len(),
                media_failures: warnings.len(),
            })
            .await;

        Ok(CourseDeletion {
            course: course_id.clone(),
            warnings,
        })
    }

    #[instrument(skip(self))]
    pub async fn apply_discount(
        &self,
        course_id: &Record<Course>,
        percent: Decimal,
        caller: &Record<Tutor>,
    ) -> Result<Course> {
        let percent = validate_discount(percent)?;

        let _held = self.locks.lock(course_id).await?;
        let mut course = self.authored_course(course_id, caller).await?;

        course.discount = percent;
        course.touch();
        self.database.save(&course).await?;

        self.activity
            .record(LogData::DiscountApplied {
                course: course_id.clone(),
                percent,
            })
            .await;

        Ok(course)
    }

    #[instrument(skip(self))]
    pub async fn update_metadata(
        &self,
        course_id: &Record<Course>,
        patch: CoursePatch,
        caller: &Record<Tutor>,
    ) -> Result<Course> {
        let mut patch = patch.validate()?;

        let _held = self.locks.lock(course_id).await?;
        let mut course = self.authored_course(course_id, caller).await?;

        if let Some(source) = patch.thumbnail.take() {
            let media = self.store_media(MediaPayload::Url(source), MediaKind::Image).await?;
            course.thumbnail = media.url;
        }

        patch.apply(&mut course);
        course.touch();
        self.database.save(&course).await?;

        self.activity
            .record(LogData::CourseUpdated {
                course: course_id.clone(),
            })
            .await;

        Ok(course)
    }

    #[instrument(skip(self, upload))]
    pub async fn update_thumbnail(
        &self,
        course_id: &Record<Course>,
        upload: MediaPayload,
        caller: &Record<Tutor>,
    ) -> Result<Course> {
        let _held = self.locks.lock(course_id).await?;
        let mut course = self.authored_course(course_id, caller).await?;

        let media = self.store_media(upload, MediaKind::Image).await?;
        course.thumbnail = media.url;
        course.touch();
        self.database.save(&course).await?;

        self.activity
            .record(LogData::CourseUpdated {
                course: course_id.clone(),
            })
            .await;

        Ok(course)
    }

    pub async fn course(&self, course_id: &Record<Course>) -> Result<CourseDetails> {
        let course = self.course_record(course_id).await?;
        let mut details = self.hydrate(vec![course]).await?;

        details.pop().context(NotFoundSnafu {
            entity: "course",
            id: course_id.key(),
        })
    }

    pub async fn list_courses(&self) -> Result<Vec<CourseDetails>> {
        let courses: Vec<Course> = self
            .database
            .sql("SELECT * FROM courses ORDER BY created_at DESC")
            .fetch_first()
            .await?;

        self.hydrate(courses).await
    }

    /// Resolves the references of every course with one projection query per table.
    ///
    /// Courses keep no wishlist, so only videos, reviews and the author are expanded.
    async fn hydrate(&self, courses: Vec<Course>) -> Result<Vec<CourseDetails>> {
        let video_ids: Vec<&Record<Video>> = courses.iter().flat_map(|course| &course.videos).collect();
        let review_ids: Vec<&Record<Review>> = courses.iter().flat_map(|course| &course.reviews).collect();
        let author_ids: Vec<&Record<Tutor>> = courses.iter().map(|course| &course.author).collect();

        let videos: Vec<VideoSummary> = self
            .database
            .sql("SELECT id, title, media_url, public_id, duration_minutes FROM videos WHERE id INSIDE $ids")
            .bind(("ids", &video_ids))
            .fetch_first()
            .await?;

        let reviews: Vec<ReviewSummary> = self
            .database
            .sql("SELECT id, reviewer_name, body, rating FROM reviews WHERE id INSIDE $ids")
            .bind(("ids", &review_ids))
            .fetch_first()
            .await?;

        let authors: Vec<AuthorSummary> = self
            .database
            .sql("SELECT id, first_name, last_name, created_courses FROM tutors WHERE id INSIDE $ids")
            .bind(("ids", &author_ids))
            .fetch_first()
            .await?;

        let videos: HashMap<_, _> = videos.into_iter().map(|video| (video.id.clone(), video)).collect();
        let reviews: HashMap<_, _> = reviews.into_iter().map(|review| (review.id.clone(), review)).collect();
        let authors: HashMap<_, _> = authors.into_iter().map(|author| (author.id.clone(), author)).collect();

        let details = courses
            .into_iter()
            .map(|course| CourseDetails {
                author: authors.get(&course.author).cloned(),
                videos: course.videos.iter().filter_map(|id| videos.get(id).cloned()).collect(),
                reviews: course.reviews.iter().filter_map(|id| reviews.get(id).cloned()).collect(),
                id: course.id,
                course_name: course.course_name,
                description: course.description,
                price: course.price,
                discount: course.discount,
                level: course.level,
                category: course.category,
                thumbnail: course.thumbnail,
                duration_minutes: course.duration_minutes,
                total_subscriptions: course.total_subscriptions,
                rating: course.rating,
                enrolled_students: course.enrolled_students,
                created_at: course.created_at,
                updated_at: course.updated_at,
            })
            .collect();

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::service::testing::{self, Harness};
    use crate::service::ErrorKind;

    fn rust_course() -> NewCourse {
        NewCourse {
            course_name: Some("Rust for the Impatient".into()),
            description: Some("ownership, borrowing and async".into()),
            price: Some(dec!(100)),
            discount: None,
            level: Some("beginner".into()),
            category: Some("programming".into()),
        }
    }

    fn thumbnail() -> Option<MediaPayload> {
        Some(MediaPayload::Url("https://images.example/rust.png".into()))
    }

    async fn course_with_videos(harness: &Harness, tutor: &Record<Tutor>, seconds: &[f64]) -> (Course, Vec<Video>) {
        let course = harness
            .catalog
            .create_course(rust_course(), thumbnail(), tutor)
            .await
            .unwrap();

        let mut videos = Vec::new();
        for (index, seconds) in seconds.iter().enumerate() {
            let payload = testing::video_payload(*seconds);
            let video = harness
                .catalog
                .add_video(&course.id, NewVideo { title: format!("lecture {index}") }, payload, tutor)
                .await
                .unwrap();
            videos.push(video);
        }

        let course = harness.database.fetch(&course.id).await.unwrap().unwrap();
        (course, videos)
    }

    #[tokio::test]
    async fn create_course_links_the_author() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;

        let course = harness
            .catalog
            .create_course(rust_course(), thumbnail(), &tutor)
            .await
            .unwrap();

        assert_eq!(course.discount, Decimal::ZERO);
        assert_eq!(course.total_subscriptions, 0);
        assert!(course.thumbnail.starts_with("https://media.test/"));

        let tutor: Tutor = harness.database.fetch(&tutor).await.unwrap().unwrap();
        assert_eq!(tutor.created_courses, vec![course.id.clone()]);
    }

    #[tokio::test]
    async fn create_course_reports_missing_fields() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;

        let mut data = rust_course();
        data.level = None;
        let error = harness
            .catalog
            .create_course(data, thumbnail(), &tutor)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);

        let error = harness
            .catalog
            .create_course(rust_course(), None, &tutor)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(harness.media.stored().is_empty());
    }

    #[tokio::test]
    async fn create_course_rejects_negative_price() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;

        let mut data = rust_course();
        data.price = Some(dec!(-1));
        let error = harness
            .catalog
            .create_course(data, thumbnail(), &tutor)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn create_course_needs_a_registered_tutor() {
        let harness = Harness::new().await;

        let error = harness
            .catalog
            .create_course(rust_course(), thumbnail(), &Record::new("ghost"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(harness.media.stored().is_empty());
    }

    #[tokio::test]
    async fn duration_tracks_added_and_removed_videos() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;

        let (course, videos) = course_with_videos(&harness, &tutor, &[600.0, 930.0]).await;
        assert_eq!(course.duration_minutes, dec!(25.5));
        assert_eq!(course.videos, vec![videos[0].id.clone(), videos[1].id.clone()]);

        let removal = harness.catalog.remove_video(&videos[0].id, &tutor).await.unwrap();
        let VideoRemoval::Removed(course) = removal else {
            panic!("the video was listed by its course");
        };

        assert_eq!(course.duration_minutes, dec!(15.5));
        assert_eq!(course.videos, vec![videos[1].id.clone()]);
        assert_eq!(harness.media.deleted(), vec![videos[0].public_id.clone()]);

        let gone: Option<Video> = harness.database.fetch(&videos[0].id).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn duration_is_the_sum_after_any_sequence() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;

        let (_, videos) = course_with_videos(&harness, &tutor, &[60.0, 90.0, 120.0, 30.0]).await;
        harness.catalog.remove_video(&videos[2].id, &tutor).await.unwrap();
        harness.catalog.remove_video(&videos[0].id, &tutor).await.unwrap();

        let course: Course = harness.database.fetch(&videos[1].course).await.unwrap().unwrap();
        assert_eq!(course.duration_minutes, dec!(2.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_video_uploads_are_all_counted() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;
        let course = harness
            .catalog
            .create_course(rust_course(), thumbnail(), &tutor)
            .await
            .unwrap();

        let tasks: Vec<_> = (1..=6)
            .map(|minutes| {
                let catalog = harness.catalog.clone();
                let course = course.id.clone();
                let tutor = tutor.clone();
                let payload = testing::video_payload(f64::from(minutes) * 60.0);
                let meta = NewVideo {
                    title: format!("lecture {minutes}"),
                };
                tokio::spawn(async move { catalog.add_video(&course, meta, payload, &tutor).await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let course: Course = harness.database.fetch(&course.id).await.unwrap().unwrap();
        assert_eq!(course.videos.len(), 6);
        assert_eq!(course.duration_minutes, dec!(21));
    }

    #[tokio::test]
    async fn removing_an_unlisted_video_still_deletes_its_media() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;
        let (mut course, videos) = course_with_videos(&harness, &tutor, &[600.0]).await;

        course.detach_video(&videos[0].id);
        harness.database.save(&course).await.unwrap();

        let removal = harness.catalog.remove_video(&videos[0].id, &tutor).await.unwrap();
        assert_eq!(removal, VideoRemoval::NotPresent);
        assert_eq!(harness.media.deleted(), vec![videos[0].public_id.clone()]);
    }

    #[tokio::test]
    async fn only_the_author_modifies_a_course() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;
        let intruder = harness.tutor("mallory").await;
        let (course, videos) = course_with_videos(&harness, &tutor, &[600.0]).await;

        let error = harness
            .catalog
            .apply_discount(&course.id, dec!(10), &intruder)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);

        let error = harness.catalog.remove_video(&videos[0].id, &intruder).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);

        let error = harness.catalog.delete_course(&course.id, &intruder).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden);
        assert!(harness.media.deleted().is_empty());
    }

    #[tokio::test]
    async fn add_video_to_unknown_course_is_not_found() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;

        let error = harness
            .catalog
            .add_video(
                &Record::new("missing"),
                NewVideo { title: "intro".into() },
                testing::video_payload(60.0),
                &tutor,
            )
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(harness.media.stored().is_empty());
    }

    #[tokio::test]
    async fn discount_outside_range_leaves_the_course_unchanged() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;
        let (course, _) = course_with_videos(&harness, &tutor, &[]).await;

        for percent in [dec!(-1), dec!(100.01), dec!(150)] {
            let error = harness
                .catalog
                .apply_discount(&course.id, percent, &tutor)
                .await
                .unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Validation);
        }

        let stored: Course = harness.database.fetch(&course.id).await.unwrap().unwrap();
        assert_eq!(stored, course);

        let discounted = harness
            .catalog
            .apply_discount(&course.id, dec!(100), &tutor)
            .await
            .unwrap();
        assert_eq!(discounted.discount, dec!(100));
    }

    #[tokio::test]
    async fn delete_course_survives_media_failures() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;
        let student = harness.student("alice").await;
        let (course, videos) = course_with_videos(&harness, &tutor, &[60.0, 120.0, 180.0]).await;
        harness.enrollment.enroll(&course.id, &student).await.unwrap();

        harness.media.fail_deletes_of(&videos[0].public_id);
        harness.media.fail_deletes_of(&videos[2].public_id);

        let deletion = harness.catalog.delete_course(&course.id, &tutor).await.unwrap();
        assert_eq!(deletion.warnings.len(), 2);
        assert_eq!(harness.media.delete_attempts(), 3);

        let gone: Option<Course> = harness.database.fetch(&course.id).await.unwrap();
        assert!(gone.is_none());
        let remaining = Video::of_course(&course.id, &harness.database).await.unwrap();
        assert!(remaining.is_empty());

        let tutor: Tutor = harness.database.fetch(&tutor).await.unwrap().unwrap();
        assert!(tutor.created_courses.is_empty());
        let student: Student = harness.database.fetch(&student).await.unwrap().unwrap();
        assert!(student.enrolled_courses.is_empty());
    }

    #[tokio::test]
    async fn update_metadata_applies_allowed_fields() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;
        let (course, _) = course_with_videos(&harness, &tutor, &[]).await;

        let patch = CoursePatch {
            course_name: Some("Rust, Patiently".into()),
            price: Some(dec!(250)),
            thumbnail: Some("https://images.example/new.png".into()),
            ..CoursePatch::default()
        };
        let updated = harness.catalog.update_metadata(&course.id, patch, &tutor).await.unwrap();

        assert_eq!(updated.course_name, "Rust, Patiently");
        assert_eq!(updated.price, dec!(250));
        assert_eq!(updated.level, course.level);
        assert_ne!(updated.thumbnail, "https://images.example/new.png");
        assert!(updated.thumbnail.starts_with("https://media.test/"));
    }

    #[test]
    fn course_patch_rejects_unknown_fields() {
        let patch = serde_json::from_str::<CoursePatch>(r#"{"total_subscriptions": 1000}"#);
        assert!(patch.is_err());

        let patch = serde_json::from_str::<CoursePatch>(r#"{"level": "advanced"}"#).unwrap();
        assert_eq!(patch.level.as_deref(), Some("advanced"));
    }

    #[tokio::test]
    async fn update_thumbnail_stores_the_upload() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;
        let (course, _) = course_with_videos(&harness, &tutor, &[]).await;

        let upload = MediaPayload::Upload {
            file_name: "cover.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![1, 2, 3],
        };
        let updated = harness
            .catalog
            .update_thumbnail(&course.id, upload, &tutor)
            .await
            .unwrap();

        assert_ne!(updated.thumbnail, course.thumbnail);
    }

    #[tokio::test]
    async fn course_details_follow_video_order() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;
        let (course, videos) = course_with_videos(&harness, &tutor, &[60.0, 120.0, 30.0]).await;

        let details = harness.catalog.course(&course.id).await.unwrap();
        let titles: Vec<_> = details.videos.iter().map(|video| video.title.as_str()).collect();
        assert_eq!(titles, ["lecture 0", "lecture 1", "lecture 2"]);
        assert_eq!(details.videos[2].id, videos[2].id);

        let author = details.author.unwrap();
        assert_eq!(author.first_name, "Ada");
        assert_eq!(author.created_courses, vec![course.id.clone()]);

        let json = serde_json::to_value(&harness.catalog.course(&course.id).await.unwrap()).unwrap();
        assert_eq!(json["id"], course.id.key());
        assert_eq!(json["videos"][0]["id"], videos[0].id.key());
    }

    #[tokio::test]
    async fn list_courses_hydrates_every_course() {
        let harness = Harness::new().await;
        let ada = harness.tutor("ada").await;
        let grace = harness.tutor("grace").await;
        course_with_videos(&harness, &ada, &[60.0]).await;
        course_with_videos(&harness, &grace, &[60.0, 60.0]).await;

        let courses = harness.catalog.list_courses().await.unwrap();
        assert_eq!(courses.len(), 2);

        let mut video_counts: Vec<_> = courses.iter().map(|course| course.videos.len()).collect();
        video_counts.sort();
        assert_eq!(video_counts, [1, 2]);
        assert!(courses.iter().all(|course| course.author.is_some()));
    }

    #[tokio::test]
    async fn missing_course_is_not_found() {
        let harness = Harness::new().await;

        let error = harness.catalog.course(&Record::new("missing")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
