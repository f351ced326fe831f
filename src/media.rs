use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive as _;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use snafu::{Location, Snafu};

pub use cloudinary::{Cloudinary, MediaConfig};

mod cloudinary;

/// Which kind of asset the media service stores, it decides the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn resource_type(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Raw content handed to the media service.
#[derive(Clone, PartialEq)]
pub enum MediaPayload {
    /// A remote or `data:` URL that the media service fetches itself.
    Url(String),
    /// Bytes received from the client.
    Upload {
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl std::fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaPayload::Url(url) if url.starts_with("data:") => {
                write!(f, "Url(data: {} bytes)", url.len())
            }
            MediaPayload::Url(url) => f.debug_tuple("Url").field(url).finish(),
            MediaPayload::Upload {
                file_name,
                content_type,
                bytes,
            } => f
                .debug_struct("Upload")
                .field("file_name", file_name)
                .field("content_type", content_type)
                .field("size", &bytes.len())
                .finish(),
        }
    }
}

/// A stored asset: where it is served from and how to delete it later.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MediaRef {
    pub url: String,
    pub public_id: String,
    pub duration_seconds: Option<f64>,
}

impl MediaRef {
    /// Playback length in minutes with three decimal places. Assets without a duration count as zero.
    pub fn duration_minutes(&self) -> Decimal {
        let seconds = self
            .duration_seconds
            .and_then(Decimal::from_f64)
            .unwrap_or_default()
            .max(Decimal::ZERO);

        (seconds / Decimal::from(60)).round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MediaError {
    #[snafu(display("could not build the media client at {location}: {source}"))]
    Client {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not reach the media service at {location}: {source}"))]
    Request {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the media service did not answer within {after:?}"))]
    Timeout {
        after: Duration,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the media service rejected the {action} request ({status}): {message}"))]
    Rejected {
        action: &'static str,
        status: u16,
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed response from the media service at {location}: {source}"))]
    Decode {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Object storage for thumbnails and lecture videos.
#[async_trait]
pub trait MediaStore: std::fmt::Debug + Send + Sync {
    /// Uploads the payload and returns the permanent reference to it.
    async fn store(&self, payload: MediaPayload, kind: MediaKind) -> Result<MediaRef, MediaError>;

    /// Deletes the asset. Deleting an asset that is already gone succeeds.
    async fn delete(&self, public_id: &str, kind: MediaKind) -> Result<(), MediaError>;
}
