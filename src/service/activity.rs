use derive_new::new;

use crate::database::{Database, Table as _};
use crate::model::{Log, LogData};

/// Appends domain events to the `logs` table.
#[derive(Debug, Clone, new)]
pub struct Activity {
    database: Database,
}

impl Activity {
    /// Writing the log never fails the operation that produced the event.
    pub async fn record(&self, message: LogData) {
        let log = Log::from(message);

        if let Err(error) = self.database.save(&log).await {
            tracing::warn!(log = ?log, error = %error, "could not record activity `{}`", log.id());
        }
    }
}
