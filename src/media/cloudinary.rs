use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use snafu::ResultExt as _;
use tracing::instrument;

use super::*;

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    #[serde(rename = "cloudinary_cloud_name")]
    pub cloud_name: String,
    #[serde(rename = "cloudinary_api_key")]
    pub api_key: String,
    #[serde(rename = "cloudinary_api_secret")]
    pub api_secret: SecretString,
    #[serde(rename = "cloudinary_upload_preset", default = "default_upload_preset")]
    pub upload_preset: String,
    #[serde(rename = "cloudinary_base_url", default = "default_base_url")]
    pub base_url: String,
}

fn default_upload_preset() -> String {
    "cloudversity-dev".to_string()
}

fn default_base_url() -> String {
    "https://api.cloudinary.com".to_string()
}

/// [MediaStore] backed by Cloudinary's upload API.
///
/// Uploads go through an unsigned upload preset, deletions are signed with the API secret.
#[derive(Debug, Clone)]
pub struct Cloudinary {
    client: reqwest::Client,
    config: MediaConfig,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

impl Cloudinary {
    pub fn new(config: MediaConfig, timeout: Duration) -> Result<Self, MediaError> {
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

    fn endpoint(&self, kind: MediaKind, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name,
            kind.resource_type(),
            action
        )
    }

    fn request_failed(&self, source: reqwest::Error) -> MediaError {
        if source.is_timeout() {
            return TimeoutSnafu {
                after: self.timeout,
            }
            .build();
        }

        MediaError::Request {
            source,
            location: snafu::location!(),
        }
    }

    async fn rejected(action: &'static str, response: Response) -> MediaError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => "no error message".to_string(),
        };

        RejectedSnafu {
            action,
            status,
            message,
        }
        .build()
    }
}

#[async_trait]
impl MediaStore for Cloudinary {
    #[instrument(skip(self))]
    async fn store(&self, payload: MediaPayload, kind: MediaKind) -> Result<MediaRef, MediaError> {
        let file = match payload {
            MediaPayload::Url(url) => Part::text(url),
            MediaPayload::Upload {
                file_name,
                content_type,
                bytes,
            } => {
                let part = Part::bytes(bytes).file_name(file_name);
                match content_type {
                    Some(content_type) => part.mime_str(&content_type).context(RequestSnafu)?,
                    None => part,
                }
            }
        };

        let form = Form::new()
            .part("file", file)
            .text("upload_preset", self.config.upload_preset.clone());

        let response = self
            .client
            .post(self.endpoint(kind, "upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|source| self.request_failed(source))?;

        if !response.status().is_success() {
            return Err(Self::rejected("upload", response).await);
        }

        let uploaded: UploadResponse = response.json().await.context(DecodeSnafu)?;
        tracing::info!(public_id = %uploaded.public_id, ?kind, duration = ?uploaded.duration, "stored media");

        Ok(MediaRef {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
            duration_seconds: uploaded.duration,
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, public_id: &str, kind: MediaKind) -> Result<(), MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &format!("public_id={public_id}&timestamp={timestamp}"),
            self.config.api_secret.expose_secret(),
        );

        let response = self
            .client
            .post(self.endpoint(kind, "destroy"))
            .form(&[
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await
            .map_err(|source| self.request_failed(source))?;

        if !response.status().is_success() {
            return Err(Self::rejected("destroy", response).await);
        }

        let status = response.status().as_u16();
        let destroyed: DestroyResponse = response.json().await.context(DecodeSnafu)?;

        match destroyed.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                tracing::debug!(public_id, "media was already gone");
                Ok(())
            }
            other => RejectedSnafu {
                action: "destroy",
                status,
                message: other.to_string(),
            }
            .fail(),
        }
    }
}

/// Cloudinary request signature: hex encoded SHA-256 of the sorted parameters followed by the API secret.
fn sign(params: &str, secret: &str) -> String {
    hex::encode(Sha256::digest(format!("{params}{secret}")))
}
