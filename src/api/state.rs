use std::sync::Arc;

use axum::extract::FromRef;
use derive_new::new;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::database::Database;
use crate::media::MediaStore;
use crate::payment::PaymentGateway;
use crate::service::{Activity, Catalog, Enrollment, Locks, Payments, Profiles};

#[derive(Debug, Clone, new)]
pub struct App {
    pub catalog: Catalog,
    pub enrollment: Enrollment,
    pub payments: Payments,
    pub profiles: Profiles,
    pub authenticator: Authenticator,
}

impl FromRef<App> for Authenticator {
    fn from_ref(app: &App) -> Self {
        app.authenticator.clone()
    }
}

/// Wires every service to the shared database, lock table and external clients.
pub fn create_app(
    config: &Config,
    database: Database,
    media: Arc<dyn MediaStore>,
    gateway: Arc<dyn PaymentGateway>,
) -> App {
    let locks = Locks::new(config.lock_timeout());
    let activity = Activity::new(database.clone());
    let timeout = config.external_timeout();

    App {
        catalog: Catalog::new(database.clone(), media, locks.clone(), activity.clone(), timeout),
        enrollment: Enrollment::new(database.clone(), locks.clone(), activity.clone()),
        payments: Payments::new(gateway, activity, timeout),
        profiles: Profiles::new(database, locks),
        authenticator: Authenticator::new(&config.auth),
    }
}
