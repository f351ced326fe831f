use derive_new::new;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{now, Course, Profile, Timestamp};
use crate::database::Record;
use crate::define_table;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Tutor {
    pub id: Record<Tutor>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[new(default)]
    #[serde(default)]
    pub created_courses: Vec<Record<Course>>,
    /// Only ever grows, see [Tutor::credit].
    #[new(default)]
    #[serde(default)]
    pub total_earnings: Decimal,
    #[new(default)]
    #[serde(default)]
    pub profile: Option<Record<Profile>>,
    #[new(value = "now()")]
    pub created_at: Timestamp,
}

define_table!("tutors" : Tutor = id);

impl Tutor {
    /// Adds to the earnings. Negative amounts are ignored.
    pub fn credit(&mut self, amount: Decimal) {
        if amount.is_sign_positive() {
            self.total_earnings += amount;
        }
    }

    pub fn publish(&mut self, course: Record<Course>) {
        if !self.created_courses.contains(&course) {
            self.created_courses.push(course);
        }
    }

    pub fn retract(&mut self, course: &Record<Course>) {
        self.created_courses.retain(|id| id != course);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn tutor() -> Tutor {
        Tutor::new(Record::new("ada"), "Ada".into(), "Lovelace".into(), "ada@example.com".into())
    }

    #[test]
    fn earnings_never_decrease() {
        let mut tutor = tutor();
        tutor.credit(dec!(20.00));
        tutor.credit(dec!(-5));
        assert_eq!(tutor.total_earnings, dec!(20.00));
    }

    #[test]
    fn publishing_twice_lists_the_course_once() {
        let mut tutor = tutor();
        let course = Record::<Course>::new("rust-101");
        tutor.publish(course.clone());
        tutor.publish(course.clone());
        assert_eq!(tutor.created_courses, vec![course.clone()]);

        tutor.retract(&course);
        assert!(tutor.created_courses.is_empty());
    }
}
