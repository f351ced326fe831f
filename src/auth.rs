use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, TokenData, Validation};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};

use crate::database::Record;
use crate::model::{Student, Tutor};

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(rename = "jwt_secret")]
    pub secret: SecretString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Tutor,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user: String,
    pub role: Role,
}

impl Caller {
    /// The student record keyed by this user.
    pub fn student(&self) -> Record<Student> {
        Record::new(self.user.as_str())
    }

    /// The tutor record keyed by this user.
    pub fn tutor(&self) -> Record<Tutor> {
        Record::new(self.user.as_str())
    }
}

#[derive(Debug, Snafu, Serialize)]
#[serde(tag = "error", content = "data")]
pub enum AuthError {
    #[snafu(display("failed to decode JWT token"))]
    Decode {
        #[serde(skip)]
        source: jsonwebtoken::errors::Error,
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to encode JWT token"))]
    Encode {
        #[serde(skip)]
        source: jsonwebtoken::errors::Error,
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("request is not authenticated"))]
    ExtractToken {
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    message: String,
    #[serde(flatten)]
    data: AuthError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AuthError::Encode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Decode { .. } | AuthError::ExtractToken { .. } => StatusCode::UNAUTHORIZED,
        };

        let content = AuthResponse {
            message: self.to_string(),
            data: self,
        };

        (status, Json(content)).into_response()
    }
}

/// Issues and verifies HS256 bearer tokens.
#[derive(Debug, Clone)]
pub struct Authenticator {
    secret: SecretString,
    algorithm: Algorithm,
    validation: Validation,
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Self {
        let algorithm = Algorithm::HS256;

        Self {
            secret: config.secret.clone(),
            algorithm,
            validation: Validation::new(algorithm),
        }
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.expose_secret().as_ref())
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose_secret().as_ref())
    }

    fn header(&self) -> jsonwebtoken::Header {
        jsonwebtoken::Header::new(self.algorithm)
    }

    pub fn decode(&self, token: &str) -> Result<TokenData<Claims>, AuthError> {
        jsonwebtoken::decode(token, &self.decoding_key(), &self.validation).context(DecodeSnafu)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&self.header(), claims, &self.encoding_key()).context(EncodeSnafu)
    }

    pub fn expiration(&self) -> i64 {
        (Utc::now() + Duration::days(7)).timestamp()
    }

    /// A week-long token for the user.
    pub fn issue(&self, user: &str, role: Role) -> Result<String, AuthError> {
        self.encode(&Claims {
            sub: user.to_string(),
            role,
            exp: self.expiration(),
        })
    }

    pub fn extract_token(&self, parts: &Parts) -> Result<TokenData<Claims>, AuthError> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .context(ExtractTokenSnafu)?;

        let token = header.to_str().ok().context(ExtractTokenSnafu)?;
        let token = token.strip_prefix("Bearer ").context(ExtractTokenSnafu)?;

        self.decode(token)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    Authenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Authenticator::from_ref(state);
        let token = authenticator.extract_token(parts)?;

        Ok(Caller {
            user: token.claims.sub,
            role: token.claims.role,
        })
    }
}
