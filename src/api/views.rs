//! Response bodies. Record ids leave the service as their bare keys.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::database::record::{serialize_key, serialize_keys};
use crate::database::Record;
use crate::model::{Course, Profile, Review, Student, Timestamp, Tutor, Video};
use crate::service::VideoRemoval;

#[derive(Debug, Serialize)]
pub struct CourseView {
    #[serde(serialize_with = "serialize_key")]
    pub id: Record<Course>,
    pub course_name: String,
    pub description: String,
    #[serde(serialize_with = "serialize_key")]
    pub author: Record<Tutor>,
    pub price: Decimal,
    pub discount: Decimal,
    pub level: String,
    pub category: String,
    pub thumbnail: String,
    pub duration_minutes: Decimal,
    pub total_subscriptions: usize,
    pub rating: Option<Decimal>,
    #[serde(serialize_with = "serialize_keys")]
    pub videos: Vec<Record<Video>>,
    #[serde(serialize_with = "serialize_keys")]
    pub enrolled_students: Vec<Record<Student>>,
    #[serde(serialize_with = "serialize_keys")]
    pub reviews: Vec<Record<Review>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Course> for CourseView {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            course_name: course.course_name,
            description: course.description,
            author: course.author,
            price: course.price,
            discount: course.discount,
            level: course.level,
            category: course.category,
            thumbnail: course.thumbnail,
            duration_minutes: course.duration_minutes,
            total_subscriptions: course.total_subscriptions,
            rating: course.rating,
            videos: course.videos,
            enrolled_students: course.enrolled_students,
            reviews: course.reviews,
            created_at: course.created_at,
            updated_at: course.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VideoView {
    #[serde(serialize_with = "serialize_key")]
    pub id: Record<Video>,
    #[serde(serialize_with = "serialize_key")]
    pub course: Record<Course>,
    pub title: String,
    pub media_url: String,
    pub public_id: String,
    pub duration_minutes: Decimal,
    pub created_at: Timestamp,
}

impl From<Video> for VideoView {
    fn from(video: Video) -> Self {
        Self {
            id: video.id,
            course: video.course,
            title: video.title,
            media_url: video.media_url,
            public_id: video.public_id,
            duration_minutes: video.duration_minutes,
            created_at: video.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VideoRemovalView {
    pub removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<CourseView>,
}

impl From<VideoRemoval> for VideoRemovalView {
    fn from(removal: VideoRemoval) -> Self {
        match removal {
            VideoRemoval::Removed(course) => Self {
                removed: true,
                course: Some(course.into()),
            },
            VideoRemoval::NotPresent => Self {
                removed: false,
                course: None,
            },
        }
    }
}

/// A student or tutor, whichever the route deals with.
#[derive(Debug, Serialize)]
pub struct IdentityView {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub courses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_earnings: Option<Decimal>,
}

impl From<Student> for IdentityView {
    fn from(student: Student) -> Self {
        Self {
            id: student.id.key(),
            first_name: student.first_name,
            last_name: student.last_name,
            email: student.email,
            profile: student.profile.map(|profile| profile.key()),
            courses: student.enrolled_courses.iter().map(Record::key).collect(),
            total_earnings: None,
        }
    }
}

impl From<Tutor> for IdentityView {
    fn from(tutor: Tutor) -> Self {
        Self {
            id: tutor.id.key(),
            first_name: tutor.first_name,
            last_name: tutor.last_name,
            email: tutor.email,
            profile: tutor.profile.map(|profile| profile.key()),
            courses: tutor.created_courses.iter().map(Record::key).collect(),
            total_earnings: Some(tutor.total_earnings),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    #[serde(serialize_with = "serialize_key")]
    pub id: Record<Profile>,
    pub owner: String,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    pub created_at: Timestamp,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            owner: profile.owner,
            headline: profile.headline,
            bio: profile.bio,
            avatar: profile.avatar,
            website: profile.website,
            created_at: profile.created_at,
        }
    }
}
