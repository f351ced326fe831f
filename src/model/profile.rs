use derive_new::new;
use serde::{Deserialize, Serialize};

use super::{now, Timestamp};
use crate::database::Record;
use crate::define_table;

/// Public profile details of a student or tutor. `owner` is the key shared by the user's identity records.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Profile {
    #[new(default)]
    pub id: Record<Profile>,
    pub owner: String,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    #[new(value = "now()")]
    pub created_at: Timestamp,
}

define_table!("profiles" : Profile = id);
