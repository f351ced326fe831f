use derive_new::new;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{now, Course, Timestamp, Tutor};
use crate::database::Record;
use crate::{define_relation, define_table};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Video {
    #[new(default)]
    pub id: Record<Video>,
    pub course: Record<Course>,
    pub author: Record<Tutor>,
    pub title: String,
    pub media_url: String,
    pub public_id: String,
    pub duration_minutes: Decimal,
    #[new(value = "now()")]
    pub created_at: Timestamp,
}

define_table!("videos" : Video = id);

define_relation! {
    Video > of_course(course: &Record<Course>) > Vec<Video>
        where "SELECT * FROM videos WHERE course = $course"
}
