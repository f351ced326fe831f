//! In-memory doubles for the external services and a fully wired set of services over `mem://`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Activity, Catalog, Enrollment, Locks, Payments, Profiles};
use crate::database::{Database, Record};
use crate::media::{MediaError, MediaKind, MediaPayload, MediaRef, MediaStore, RejectedSnafu};
use crate::model::{Student, Tutor};
use crate::payment::{ChargeRequest, ChargeResult, PaymentError, PaymentGateway};

/// A video upload whose stored duration will be `seconds`.
pub fn video_payload(seconds: f64) -> MediaPayload {
    MediaPayload::Url(format!("https://videos.example/lecture.mp4?duration={seconds}"))
}

fn duration_of(payload: &MediaPayload) -> Option<f64> {
    match payload {
        MediaPayload::Url(url) => url.split_once("duration=")?.1.parse().ok(),
        MediaPayload::Upload { .. } => None,
    }
}

#[derive(Debug, Default)]
pub struct RecordingMedia {
    stored: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMedia {
    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn delete_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn fail_deletes_of(&self, public_id: &str) {
        self.failing.lock().unwrap().insert(public_id.to_string());
    }
}

#[async_trait]
impl MediaStore for RecordingMedia {
    async fn store(&self, payload: MediaPayload, kind: MediaKind) -> Result<MediaRef, MediaError> {
        let mut stored = self.stored.lock().unwrap();
        let public_id = format!("cloudversity-dev/{}-{}", kind.resource_type(), stored.len());
        stored.push(public_id.clone());

        Ok(MediaRef {
            url: format!("https://media.test/{public_id}"),
            public_id,
            duration_seconds: duration_of(&payload),
        })
    }

    async fn delete(&self, public_id: &str, _kind: MediaKind) -> Result<(), MediaError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(public_id) {
            return RejectedSnafu {
                action: "destroy",
                status: 500u16,
                message: "storage unavailable",
            }
            .fail();
        }

        self.deleted.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

/// Approves every token except `tok_chargeDeclined`, optionally after a delay.
#[derive(Debug, Default)]
pub struct FakeGateway {
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl FakeGateway {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, PaymentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if request.token == "tok_chargeDeclined" {
            return Ok(ChargeResult::declined("Your card was declined."));
        }

        Ok(ChargeResult::approved(format!("ch_test_{call}")))
    }
}

/// Every service wired to one in-memory database.
pub struct Harness {
    pub database: Database,
    pub media: Arc<RecordingMedia>,
    pub catalog: Catalog,
    pub enrollment: Enrollment,
    pub profiles: Profiles,
    pub payments: Payments,
}

impl Harness {
    pub async fn new() -> Self {
        let database = Database::in_memory().await.unwrap();
        let media = Arc::new(RecordingMedia::default());
        let locks = Locks::new(Duration::from_secs(5));
        let activity = Activity::new(database.clone());
        let timeout = Duration::from_secs(5);

        Self {
            catalog: Catalog::new(database.clone(), media.clone(), locks.clone(), activity.clone(), timeout),
            enrollment: Enrollment::new(database.clone(), locks.clone(), activity.clone()),
            profiles: Profiles::new(database.clone(), locks),
            payments: Payments::new(Arc::new(FakeGateway::default()), activity, timeout),
            media,
            database,
        }
    }

    pub async fn tutor(&self, key: &str) -> Record<Tutor> {
        let tutor = Tutor::new(Record::new(key), capitalized(key), "Example".into(), format!("{key}@example.com"));
        self.database.save(&tutor).await.unwrap();
        tutor.id
    }

    pub async fn student(&self, key: &str) -> Record<Student> {
        let student = Student::new(Record::new(key), capitalized(key), "Example".into(), format!("{key}@example.com"));
        self.database.save(&student).await.unwrap();
        student.id
    }
}

fn capitalized(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
