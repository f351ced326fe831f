use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use snafu::ResultExt as _;
use tracing::instrument;

use super::error::{PaymentSnafu, Result};
use super::{bounded, Activity};
use crate::model::LogData;
use crate::payment::{ChargeRequest, ChargeResult, PaymentGateway};

/// Charges payment tokens. Knows nothing about enrollments, a paid charge does not enroll anyone.
#[derive(Debug, Clone, new)]
pub struct Payments {
    gateway: Arc<dyn PaymentGateway>,
    activity: Activity,
    external_timeout: Duration,
}

impl Payments {
    #[instrument(skip(self, request), fields(email = %request.email, course = %request.course_name))]
    pub async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult> {
        let email = request.email.clone();
        let course_name = request.course_name.clone();
        let amount = request.amount;

        let result = bounded("payment gateway", self.external_timeout, self.gateway.charge(request))
            .await?
            .context(PaymentSnafu)?;

        self.activity
            .record(LogData::PaymentCharged {
                email,
                course_name,
                amount,
                success: result.success,
                receipt_id: result.receipt_id.clone(),
            })
            .await;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::database::Database;
    use crate::model::Log;
    use crate::service::testing::FakeGateway;
    use crate::service::ErrorKind;

    fn request(token: &str) -> ChargeRequest {
        ChargeRequest {
            token: token.into(),
            email: "alice@example.com".into(),
            amount: dec!(499),
            course_name: "Rust for the Impatient".into(),
            shipping: None,
        }
    }

    async fn payments(gateway: FakeGateway, timeout: Duration) -> (Payments, Database) {
        let database = Database::in_memory().await.unwrap();
        let payments = Payments::new(Arc::new(gateway), Activity::new(database.clone()), timeout);
        (payments, database)
    }

    #[tokio::test]
    async fn successful_charges_are_logged() {
        let (payments, database) = payments(FakeGateway::default(), Duration::from_secs(1)).await;

        let result = payments.charge(request("tok_visa")).await.unwrap();
        assert!(result.success);
        assert!(result.receipt_id.is_some());

        let logs: Vec<Log> = database.sql("SELECT * FROM logs").fetch_first().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(matches!(logs[0].message, LogData::PaymentCharged { success: true, .. }));
    }

    #[tokio::test]
    async fn declines_are_results_not_errors() {
        let (payments, _) = payments(FakeGateway::default(), Duration::from_secs(1)).await;

        let result = payments.charge(request("tok_chargeDeclined")).await.unwrap();
        assert!(!result.success);
        assert!(result.failure.is_some());
    }

    #[tokio::test]
    async fn slow_gateway_times_out_without_retrying() {
        let gateway = FakeGateway::slow(Duration::from_millis(200));
        let calls = gateway.calls();
        let (payments, _) = payments(gateway, Duration::from_millis(20)).await;

        let error = payments.charge(request("tok_visa")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ExternalService);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
