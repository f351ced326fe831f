use chrono::Utc;

pub use course::*;
pub use log::*;
pub use profile::*;
pub use review::*;
pub use student::*;
pub use tutor::*;
pub use video::*;

mod course;
mod log;
mod profile;
mod review;
mod student;
mod tutor;
mod video;

pub type Timestamp = chrono::DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}
