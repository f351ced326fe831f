use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snafu::{Location, Snafu};

pub use stripe::{PaymentConfig, Stripe};

mod stripe;

/// Where the purchase is shipped, as printed on the card.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Shipping {
    pub name: String,
    pub address_line1: Option<String>,
    pub address_country: Option<String>,
}

/// A single charge. The gateway knows nothing about courses beyond the name printed on the receipt.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChargeRequest {
    pub token: String,
    pub email: String,
    pub amount: Decimal,
    pub course_name: String,
    #[serde(default)]
    pub shipping: Option<Shipping>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChargeResult {
    pub success: bool,
    pub receipt_id: Option<String>,
    /// Why the charge was declined, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ChargeResult {
    pub fn approved(receipt_id: impl Into<String>) -> Self {
        Self {
            success: true,
            receipt_id: Some(receipt_id.into()),
            failure: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            receipt_id: None,
            failure: Some(reason.into()),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PaymentError {
    #[snafu(display("could not build the payment client at {location}: {source}"))]
    Client {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not reach the payment gateway at {location}: {source}"))]
    Request {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the payment gateway did not answer within {after:?}"))]
    Timeout {
        after: Duration,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the payment gateway rejected the {action} request ({status}): {message}"))]
    Rejected {
        action: &'static str,
        status: u16,
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed response from the payment gateway at {location}: {source}"))]
    Decode {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{amount} cannot be charged, amounts must be positive"))]
    InvalidAmount {
        amount: Decimal,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Charges a payment token. Implementations never retry on their own.
#[async_trait]
pub trait PaymentGateway: std::fmt::Debug + Send + Sync {
    /// A declined card is a successful call with `success == false`, errors are reserved for the gateway itself failing.
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, PaymentError>;
}
