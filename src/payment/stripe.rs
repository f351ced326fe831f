use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use rust_decimal::prelude::ToPrimitive as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use snafu::{OptionExt as _, ResultExt as _};
use tracing::instrument;

use super::*;

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    #[serde(rename = "stripe_secret_key")]
    pub secret_key: SecretString,
    #[serde(rename = "stripe_currency", default = "default_currency")]
    pub currency: String,
    #[serde(rename = "stripe_base_url", default = "default_base_url")]
    pub base_url: String,
}

fn default_currency() -> String {
    "inr".to_string()
}

fn default_base_url() -> String {
    "https://api.stripe.com".to_string()
}

/// [PaymentGateway] backed by Stripe's customers and charges API.
#[derive(Debug, Clone)]
pub struct Stripe {
    client: reqwest::Client,
    config: PaymentConfig,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Charge {
    id: String,
    paid: bool,
    #[serde(default)]
    failure_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl StripeError {
    fn describe(self) -> String {
        self.message
            .or(self.code)
            .unwrap_or_else(|| "no error message".to_string())
    }
}

impl Stripe {
    pub fn new(config: PaymentConfig, timeout: Duration) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(ClientSnafu)?;

        Ok(Self {
            client,
            config,
            timeout,
        })
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), resource)
    }

    async fn post(&self, resource: &str, form: &[(String, String)]) -> Result<Response, PaymentError> {
        self.client
            .post(self.endpoint(resource))
            .basic_auth(self.config.secret_key.expose_secret(), None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    TimeoutSnafu {
                        after: self.timeout,
                    }
                    .build()
                } else {
                    PaymentError::Request {
                        source,
                        location: snafu::location!(),
                    }
                }
            })
    }
}

#[async_trait]
impl PaymentGateway for Stripe {
    #[instrument(skip(self, request), fields(email = %request.email, amount = %request.amount))]
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, PaymentError> {
        let amount = minor_units(request.amount)?;

        let response = self.post("customers", &customer_form(&request)).await?;
        // card errors come back as 402, for the customer's source as well as the charge
        if response.status() == StatusCode::PAYMENT_REQUIRED {
            return Ok(declined(response).await);
        }
        if !response.status().is_success() {
            return Err(rejected("customer", response).await);
        }
        let customer: Customer = response.json().await.context(DecodeSnafu)?;

        let form = charge_form(&request, amount, &self.config.currency, &customer.id);
        let response = self.post("charges", &form).await?;
        if response.status() == StatusCode::PAYMENT_REQUIRED {
            return Ok(declined(response).await);
        }
        if !response.status().is_success() {
            return Err(rejected("charge", response).await);
        }

        let charge: Charge = response.json().await.context(DecodeSnafu)?;
        if !charge.paid {
            let reason = charge
                .failure_message
                .unwrap_or_else(|| "charge was not paid".to_string());
            return Ok(ChargeResult::declined(reason));
        }

        tracing::info!(receipt = %charge.id, "charge succeeded");
        Ok(ChargeResult::approved(charge.id))
    }
}

async fn declined(response: Response) -> ChargeResult {
    let reason = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error.describe(),
        Err(_) => "card declined".to_string(),
    };

    tracing::info!(%reason, "charge declined");
    ChargeResult::declined(reason)
}

async fn rejected(action: &'static str, response: Response) -> PaymentError {
    let status = response.status().as_u16();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error.describe(),
        Err(_) => "no error message".to_string(),
    };

    RejectedSnafu {
        action,
        status,
        message,
    }
    .build()
}

/// The amount in the currency's smallest unit, rounded to the nearest one.
fn minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    if amount <= Decimal::ZERO {
        return InvalidAmountSnafu { amount }.fail();
    }

    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .context(InvalidAmountSnafu { amount })
}

fn customer_form(request: &ChargeRequest) -> Vec<(String, String)> {
    vec![
        ("email".to_string(), request.email.clone()),
        ("source".to_string(), request.token.clone()),
    ]
}

fn charge_form(request: &ChargeRequest, amount: i64, currency: &str, customer: &str) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), amount.to_string()),
        ("currency".to_string(), currency.to_string()),
        ("customer".to_string(), customer.to_string()),
        ("receipt_email".to_string(), request.email.clone()),
        ("description".to_string(), format!("purchase of {}", request.course_name)),
    ];

    if let Some(shipping) = &request.shipping {
        form.push(("shipping[name]".to_string(), shipping.name.clone()));
        if let Some(line1) = &shipping.address_line1 {
            form.push(("shipping[address][line1]".to_string(), line1.clone()));
        }
        if let Some(country) = &shipping.address_country {
            form.push(("shipping[address][country]".to_string(), country.clone()));
        }
    }

    form
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn request(shipping: Option<Shipping>) -> ChargeRequest {
        ChargeRequest {
            token: "tok_visa".into(),
            email: "alice@example.com".into(),
            amount: dec!(499.99),
            course_name: "Rust for the Impatient".into(),
            shipping,
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn amounts_are_charged_in_minor_units() {
        assert_eq!(minor_units(dec!(499.99)).unwrap(), 49999);
        assert_eq!(minor_units(dec!(20)).unwrap(), 2000);
        assert_eq!(minor_units(dec!(0.015)).unwrap(), 2);
    }

    #[test]
    fn non_positive_amounts_are_refused() {
        assert!(matches!(
            minor_units(Decimal::ZERO),
            Err(PaymentError::InvalidAmount { .. })
        ));
        assert!(minor_units(dec!(-1)).is_err());
    }

    #[test]
    fn charge_form_describes_the_purchase() {
        let form = charge_form(&request(None), 49999, "inr", "cus_123");

        assert_eq!(value(&form, "amount"), Some("49999"));
        assert_eq!(value(&form, "currency"), Some("inr"));
        assert_eq!(value(&form, "customer"), Some("cus_123"));
        assert_eq!(value(&form, "receipt_email"), Some("alice@example.com"));
        assert_eq!(
            value(&form, "description"),
            Some("purchase of Rust for the Impatient")
        );
        assert_eq!(value(&form, "shipping[name]"), None);
    }

    /// Serves a Stripe stand-in that declines every card when the customer is created.
    async fn declining_stripe() -> Stripe {
        let router = Router::new().route(
            "/v1/customers",
            post(|| async {
                let body = json!({ "error": { "message": "Your card was declined.", "code": "card_declined" } });
                (StatusCode::PAYMENT_REQUIRED, Json(body))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let config = PaymentConfig {
            secret_key: SecretString::new("sk_test_123".into()),
            currency: default_currency(),
            base_url: format!("http://{address}"),
        };
        Stripe::new(config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn declined_card_on_customer_creation_is_a_decline() {
        let stripe = declining_stripe().await;

        let result = stripe.charge(request(None)).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.receipt_id, None);
        assert_eq!(result.failure.as_deref(), Some("Your card was declined."));
    }

    #[test]
    fn customer_form_carries_the_card_token() {
        let form = customer_form(&request(None));

        assert_eq!(value(&form, "email"), Some("alice@example.com"));
        assert_eq!(value(&form, "source"), Some("tok_visa"));
    }

    #[test]
    fn charge_form_includes_shipping() {
        let shipping = Shipping {
            name: "Alice".into(),
            address_line1: Some("221B Baker Street".into()),
            address_country: None,
        };
        let form = charge_form(&request(Some(shipping)), 100, "inr", "cus_123");

        assert_eq!(value(&form, "shipping[name]"), Some("Alice"));
        assert_eq!(value(&form, "shipping[address][line1]"), Some("221B Baker Street"));
        assert_eq!(value(&form, "shipping[address][country]"), None);
    }
}
