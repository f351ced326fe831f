use derive_new::new;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{now, Course, Student, Timestamp, Tutor, Video};
use crate::database::Record;
use crate::define_table;

/// An entry of the append-only activity log.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Log {
    #[new(default)]
    pub id: Record<Log>,
    #[new(value = "now()")]
    pub created_at: Timestamp,
    pub message: LogData,
}

define_table!("logs" : Log = id);

impl From<LogData> for Log {
    fn from(message: LogData) -> Self {
        Self::new(message)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum LogData {
    CourseCreated {
        course: Record<Course>,
        author: Record<Tutor>,
    },
    CourseUpdated {
        course: Record<Course>,
    },
    CourseDeleted {
        course: Record<Course>,
        videos: usize,
        media_failures: usize,
    },
    DiscountApplied {
        course: Record<Course>,
        percent: Decimal,
    },
    VideoAdded {
        course: Record<Course>,
        video: Record<Video>,
        duration_minutes: Decimal,
    },
    VideoRemoved {
        course: Record<Course>,
        video: Record<Video>,
        was_listed: bool,
    },
    StudentEnrolled {
        course: Record<Course>,
        student: Record<Student>,
        tutor: Record<Tutor>,
        credited: Decimal,
    },
    PaymentCharged {
        email: String,
        course_name: String,
        amount: Decimal,
        success: bool,
        receipt_id: Option<String>,
    },
}
