use serde::{Deserialize, Serialize};

use super::{Course, Student, Timestamp};
use crate::database::Record;
use crate::define_table;

/// A stored review. Reviews are only read back when a course is hydrated.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Review {
    pub id: Record<Review>,
    pub course: Record<Course>,
    pub reviewer: Record<Student>,
    pub reviewer_name: String,
    pub body: String,
    pub rating: u8,
    pub created_at: Timestamp,
}

define_table!("reviews" : Review = id);
