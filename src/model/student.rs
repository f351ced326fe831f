use derive_new::new;
use serde::{Deserialize, Serialize};

use super::{now, Course, Profile, Timestamp};
use crate::database::Record;
use crate::define_table;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Student {
    pub id: Record<Student>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[new(default)]
    #[serde(default)]
    pub enrolled_courses: Vec<Record<Course>>,
    #[new(default)]
    #[serde(default)]
    pub profile: Option<Record<Profile>>,
    #[new(value = "now()")]
    pub created_at: Timestamp,
}

define_table!("students" : Student = id);

impl Student {
    /// Adds the course unless it is already listed.
    pub fn enroll(&mut self, course: Record<Course>) {
        if !self.enrolled_courses.contains(&course) {
            self.enrolled_courses.push(course);
        }
    }

    pub fn withdraw(&mut self, course: &Record<Course>) {
        self.enrolled_courses.retain(|id| id != course);
    }
}
