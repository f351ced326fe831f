use derive_new::new;
use rust_decimal::Decimal;
use serde::Serialize;
use snafu::OptionExt as _;
use tracing::instrument;

use super::error::{NotFoundSnafu, Result};
use super::{Activity, Locks};
use crate::database::record::serialize_keys;
use crate::database::{Database, Record};
use crate::model::{Course, LogData, Student, Tutor};

/// Applies enrollments: the course, the student and the author's earnings change together or not at all.
#[derive(Debug, Clone, new)]
pub struct Enrollment {
    database: Database,
    locks: Locks,
    activity: Activity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnrollmentResult {
    AlreadyEnrolled {
        already_enrolled: bool,
    },
    Enrolled {
        #[serde(serialize_with = "serialize_keys")]
        enrolled_courses: Vec<Record<Course>>,
        /// Amount added to the author's earnings.
        credited: Decimal,
    },
}

impl EnrollmentResult {
    fn already_enrolled() -> Self {
        EnrollmentResult::AlreadyEnrolled {
            already_enrolled: true,
        }
    }
}

impl Enrollment {
    #[instrument(skip(self))]
    pub async fn enroll(
        &self,
        course_id: &Record<Course>,
        student_id: &Record<Student>,
    ) -> Result<EnrollmentResult> {
        let author = self.course(course_id).await?.author;
        let _held = self
            .locks
            .lock_all(&[course_id.as_ref(), student_id.as_ref(), author.as_ref()])
            .await?;

        // reread under the locks, another enrollment may have landed meanwhile
        let mut course = self.course(course_id).await?;
        let mut student: Student = self.database.fetch(student_id).await?.context(NotFoundSnafu {
            entity: "student",
            id: student_id.key(),
        })?;
        let mut tutor: Tutor = self.database.fetch(&author).await?.context(NotFoundSnafu {
            entity: "tutor",
            id: author.key(),
        })?;

        if course.is_enrolled(student_id) {
            tracing::info!(course = %course_id, student = %student_id, "student is already enrolled");
            return Ok(EnrollmentResult::already_enrolled());
        }

        let credited = course.discounted_price();
        course.enroll(student_id.clone());
        student.enroll(course_id.clone());
        tutor.credit(credited);

        self.database
            .transaction()
            .update(&course)
            .update(&student)
            .update(&tutor)
            .commit()
            .await?;

        tracing::info!(course = %course_id, student = %student_id, tutor = %author, %credited, subscriptions = course.total_subscriptions, "enrolled student in `{}`", course.course_name);
        self.activity
            .record(LogData::StudentEnrolled {
                course: course_id.clone(),
                student: student_id.clone(),
                tutor: author,
                credited,
            })
            .await;

        Ok(EnrollmentResult::Enrolled {
            enrolled_courses: student.enrolled_courses,
            credited,
        })
    }

    async fn course(&self, id: &Record<Course>) -> Result<Course> {
        self.database.fetch(id).await?.context(NotFoundSnafu {
            entity: "course",
            id: id.key(),
        })
    }
}
