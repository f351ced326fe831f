use derive_new::new;
use serde::Deserialize;
use snafu::OptionExt as _;
use tracing::instrument;

use super::error::{NotFoundSnafu, Result, ValidationSnafu};
use super::Locks;
use crate::database::{Database, Record, Table, Transaction};
use crate::model::{Profile, Student, Tutor};

/// Identity records of students and tutors, keyed by the authenticated user id.
#[derive(Debug, Clone, new)]
pub struct Profiles {
    database: Database,
    locks: Locks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
}

impl NewIdentity {
    fn validate(self) -> Result<Self> {
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        let email = self.email.trim().to_lowercase();

        if first_name.is_empty() || last_name.is_empty() {
            return ValidationSnafu {
                message: "first and last name are required",
            }
            .fail();
        }

        if !email.contains('@') {
            return ValidationSnafu {
                message: format!("`{email}` is not an email address"),
            }
            .fail();
        }

        Ok(Self {
            first_name,
            last_name,
            email,
        })
    }
}

/// Whoever a profile gets attached to.
enum Owner {
    Student(Student),
    Tutor(Tutor),
}

impl Profiles {
    /// Creates the student record unless it already exists, in which case the stored one is returned unchanged.
    #[instrument(skip(self, data))]
    pub async fn register_student(&self, id: &Record<Student>, data: NewIdentity) -> Result<Student> {
        let data = data.validate()?;
        let _held = self.locks.lock(id).await?;

        if let Some(existing) = self.database.fetch(id).await? {
            return Ok(existing);
        }

        let student = Student::new(id.clone(), data.first_name, data.last_name, data.email);
        self.database.transaction().create(&student).commit().await?;
        tracing::info!(student = %id, "registered student `{} {}`", student.first_name, student.last_name);

        Ok(student)
    }

    #[instrument(skip(self, data))]
    pub async fn register_tutor(&self, id: &Record<Tutor>, data: NewIdentity) -> Result<Tutor> {
        let data = data.validate()?;
        let _held = self.locks.lock(id).await?;

        if let Some(existing) = self.database.fetch(id).await? {
            return Ok(existing);
        }

        let tutor = Tutor::new(id.clone(), data.first_name, data.last_name, data.email);
        self.database.transaction().create(&tutor).commit().await?;
        tracing::info!(tutor = %id, "registered tutor `{} {}`", tutor.first_name, tutor.last_name);

        Ok(tutor)
    }

    pub async fn student(&self, id: &Record<Student>) -> Result<Student> {
        self.database.fetch(id).await?.context(NotFoundSnafu {
            entity: "student",
            id: id.key(),
        })
    }

    pub async fn tutor(&self, id: &Record<Tutor>) -> Result<Tutor> {
        self.database.fetch(id).await?.context(NotFoundSnafu {
            entity: "tutor",
            id: id.key(),
        })
    }

    pub async fn profile(&self, id: &Record<Profile>) -> Result<Profile> {
        self.database.fetch(id).await?.context(NotFoundSnafu {
            entity: "profile",
            id: id.key(),
        })
    }

    /// Stores a new profile for the user and links it, to the student with that id or else to the tutor.
    ///
    /// The previous profile, if any, is removed in the same transaction.
    #[instrument(skip(self, data))]
    pub async fn update_profile(&self, user: &str, data: ProfileUpdate) -> Result<Profile> {
        let student_id = Record::<Student>::new(user);
        let tutor_id = Record::<Tutor>::new(user);
        let _held = self.locks.lock_all(&[student_id.as_ref(), tutor_id.as_ref()]).await?;

        let owner = match self.database.fetch(&student_id).await? {
            Some(student) => Owner::Student(student),
            None => match self.database.fetch(&tutor_id).await? {
                Some(tutor) => Owner::Tutor(tutor),
                None => {
                    return NotFoundSnafu {
                        entity: "user",
                        id: user,
                    }
                    .fail()
                }
            },
        };

        let profile = Profile::new(user.to_string(), data.headline, data.bio, data.avatar, data.website);
        let transaction = self.database.transaction().create(&profile);

        let transaction = match owner {
            Owner::Student(mut student) => {
                let previous = student.profile.replace(profile.id.clone());
                replace(transaction, &student, previous)
            }
            Owner::Tutor(mut tutor) => {
                let previous = tutor.profile.replace(profile.id.clone());
                replace(transaction, &tutor, previous)
            }
        };

        transaction.commit().await?;
        tracing::info!(user, profile = %profile.id, "updated profile");

        Ok(profile)
    }
}

fn replace<'a, T: Table + serde::Serialize>(
    transaction: Transaction<'a>,
    owner: &T,
    previous: Option<Record<Profile>>,
) -> Transaction<'a> {
    let transaction = transaction.update(owner);
    match previous {
        Some(previous) => transaction.delete(&previous),
        None => transaction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::Harness;
    use crate::service::ErrorKind;

    fn identity(first_name: &str) -> NewIdentity {
        NewIdentity {
            first_name: first_name.into(),
            last_name: "Example".into(),
            email: format!("{}@Example.com", first_name.to_lowercase()),
        }
    }

    fn headline(text: &str) -> ProfileUpdate {
        ProfileUpdate {
            headline: Some(text.into()),
            ..ProfileUpdate::default()
        }
    }

    #[tokio::test]
    async fn registration_is_idempotent() {
        let harness = Harness::new().await;
        let id = Record::<Student>::new("alice");

        let first = harness.profiles.register_student(&id, identity("Alice")).await.unwrap();
        assert_eq!(first.email, "alice@example.com");

        let second = harness.profiles.register_student(&id, identity("Someone")).await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn registration_validates_the_email() {
        let harness = Harness::new().await;
        let mut data = identity("Ada");
        data.email = "not-an-email".into();

        let error = harness
            .profiles
            .register_tutor(&Record::new("ada"), data)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn lookups_of_unknown_users_are_not_found() {
        let harness = Harness::new().await;

        let error = harness.profiles.student(&Record::new("ghost")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        let error = harness.profiles.tutor(&Record::new("ghost")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn profile_prefers_the_student_record() {
        let harness = Harness::new().await;
        let student = harness.student("sam").await;
        let tutor = harness.tutor("sam").await;

        let profile = harness.profiles.update_profile("sam", headline("learning rust")).await.unwrap();

        let student = harness.profiles.student(&student).await.unwrap();
        assert_eq!(student.profile, Some(profile.id.clone()));
        let tutor = harness.profiles.tutor(&tutor).await.unwrap();
        assert_eq!(tutor.profile, None);
    }

    #[tokio::test]
    async fn profile_falls_back_to_the_tutor() {
        let harness = Harness::new().await;
        let tutor = harness.tutor("ada").await;

        let first = harness.profiles.update_profile("ada", headline("compilers")).await.unwrap();
        let second = harness.profiles.update_profile("ada", headline("type systems")).await.unwrap();

        let tutor = harness.profiles.tutor(&tutor).await.unwrap();
        assert_eq!(tutor.profile, Some(second.id.clone()));
        assert_eq!(second.owner, "ada");

        let error = harness.profiles.profile(&first.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn profile_of_unknown_user_is_not_found() {
        let harness = Harness::new().await;

        let error = harness.profiles.update_profile("ghost", headline("hi")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
