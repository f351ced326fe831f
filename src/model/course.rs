use derive_new::new;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{now, Review, Student, Timestamp, Tutor, Video};
use crate::database::Record;
use crate::define_table;

/// A course and its derived fields.
///
/// `total_subscriptions` and `duration_minutes` are never edited directly, they are recomputed from
/// `enrolled_students` and the stored videos whenever those change.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Course {
    #[new(default)]
    pub id: Record<Course>,
    pub course_name: String,
    pub description: String,
    pub author: Record<Tutor>,
    pub price: Decimal,
    #[new(default)]
    #[serde(default)]
    pub discount: Decimal,
    pub level: String,
    pub category: String,
    pub thumbnail: String,

    #[new(default)]
    #[serde(default)]
    pub duration_minutes: Decimal,
    #[new(default)]
    #[serde(default)]
    pub total_subscriptions: usize,
    #[new(default)]
    #[serde(default)]
    pub rating: Option<Decimal>,

    #[new(default)]
    #[serde(default)]
    pub videos: Vec<Record<Video>>,
    #[new(default)]
    #[serde(default)]
    pub enrolled_students: Vec<Record<Student>>,
    #[new(default)]
    #[serde(default)]
    pub reviews: Vec<Record<Review>>,

    #[new(value = "now()")]
    pub created_at: Timestamp,
    #[new(value = "now()")]
    pub updated_at: Timestamp,
}

define_table!("courses" : Course = id);

impl Course {
    /// The amount credited to the author for one enrollment: `price * discount / 100`, rounded to cents.
    pub fn discounted_price(&self) -> Decimal {
        (self.price * self.discount / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn is_authored_by(&self, tutor: &Record<Tutor>) -> bool {
        &self.author == tutor
    }

    pub fn is_enrolled(&self, student: &Record<Student>) -> bool {
        self.enrolled_students.contains(student)
    }

    /// Adds the student unless they are already enrolled. Returns whether the list changed.
    pub fn enroll(&mut self, student: Record<Student>) -> bool {
        let added = !self.is_enrolled(&student);
        if added {
            self.enrolled_students.push(student);
        }

        self.total_subscriptions = self.enrolled_students.len();
        added
    }

    /// Drops the video from the list. Returns whether it was there.
    pub fn detach_video(&mut self, video: &Record<Video>) -> bool {
        let before = self.videos.len();
        self.videos.retain(|id| id != video);
        self.videos.len() != before
    }

    /// Sums the stored duration of every video the course still lists.
    ///
    /// Videos that are not in `self.videos` are ignored, and a listed video without a stored record counts as zero.
    pub fn recompute_duration(&mut self, stored: &[Video]) {
        self.duration_minutes = self
            .videos
            .iter()
            .filter_map(|id| stored.iter().find(|video| &video.id == id))
            .map(|video| video.duration_minutes)
            .sum();
    }

    pub fn touch(&mut self) {
        self.updated_at = now();
    }
}
